//! Integration tests for the repository pipeline.
//!
//! Tests: draft → Repository → InMemoryEntityStore → EventSink
//!
//! Verifies:
//! - Stored entities round-trip unchanged
//! - Soft delete, tenant isolation and code uniqueness
//! - Pagination totals and deterministic ordering
//! - Hierarchy cycle rejection
//! - All-or-nothing bulk create
//! - Lifecycle events and their change sets

mod tests {
    use std::sync::Arc;

    use bof_core::{
        BusinessObject, EntityId, FilterExpression, Filters, OrderBy, PageRequest, RequestContext, TenantId, UserId,
    };
    use bof_events::{InMemoryEventBus, LifecycleEvent, NoopSink, Operation, Subscription};
    use bof_inventory::{Category, CategoryDraft, CategoryPatch, Item, ItemDraft, ItemPatch};
    use bof_parties::{ContactDraft, Partner, PartnerContact, PartnerDraft, PartnerPatch};
    use bof_platform::{Company, CompanyDraft, MenuItem, MenuItemDraft};

    use crate::config::InfraConfig;
    use crate::error::RepositoryError;
    use crate::repository::Repository;
    use crate::store::InMemoryEntityStore;

    type PartnerRepo = Repository<Partner, InMemoryEntityStore<Partner>, Arc<InMemoryEventBus>>;

    fn ctx(tenant: i64) -> RequestContext {
        RequestContext::new(TenantId::new(tenant))
    }

    fn partners() -> (PartnerRepo, Subscription<LifecycleEvent>) {
        bof_observability::init_for_tests();
        let bus = Arc::new(InMemoryEventBus::new());
        let events = bus.subscribe();
        (Repository::new(InMemoryEntityStore::new(), bus), events)
    }

    fn no_filters() -> Filters {
        Filters::default()
    }

    #[test]
    fn created_entity_reads_back_identically() {
        let (repo, _) = partners();
        let created = repo
            .create(
                &ctx(1),
                PartnerDraft {
                    email: Some("Buyer@Acme.com".to_string()),
                    phone: Some("+1 555 0100".to_string()),
                    ..PartnerDraft::new("ACME").with_code("acme001").with_type("both")
                },
            )
            .unwrap();

        assert!(created.id().is_assigned());
        assert_eq!(created.tenant_id(), Some(TenantId::new(1)));
        assert_eq!(created.record.created_at, created.record.updated_at);

        let fetched = repo.get_by_id(&ctx(1), created.id(), &no_filters()).unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[test]
    fn soft_deleted_entity_is_hidden_from_listings_only() {
        let (repo, _) = partners();
        let kept = repo.create(&ctx(1), PartnerDraft::new("Kept")).unwrap();
        let gone = repo.create(&ctx(1), PartnerDraft::new("Gone").with_code("g1")).unwrap();

        assert!(repo.soft_delete(&ctx(1), gone.id(), &no_filters()).unwrap());

        let fetched = repo.get_by_id(&ctx(1), gone.id(), &no_filters()).unwrap().unwrap();
        assert!(!fetched.is_active());
        assert!(fetched.record.updated_at >= gone.record.updated_at);

        let page = repo.list(&ctx(1), &no_filters(), PageRequest::default(), None).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items, vec![kept]);

        assert_eq!(repo.get_by_code(&ctx(1), "g1").unwrap(), None);
        assert_eq!(repo.count(&ctx(1), &no_filters().include_inactive()).unwrap(), 2);
        assert_eq!(repo.count(&ctx(1), &no_filters().eq("is_active", false)).unwrap(), 1);

        let active_only = no_filters().eq("is_active", true);
        assert_eq!(repo.get_by_id(&ctx(1), gone.id(), &active_only).unwrap(), None);
    }

    #[test]
    fn acme_code_is_normalized_and_unique_per_tenant() {
        let (repo, _) = partners();

        let acme = repo
            .create(&ctx(1), PartnerDraft::new("ACME").with_code("acme001"))
            .unwrap();
        assert_eq!(acme.code.as_deref(), Some("ACME001"));

        let err = repo
            .create(&ctx(1), PartnerDraft::new("ACME again").with_code("ACME001"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)), "{err:?}");

        let other_tenant = repo
            .create(&ctx(2), PartnerDraft::new("ACME").with_code("ACME001"))
            .unwrap();
        assert_eq!(other_tenant.tenant_id(), Some(TenantId::new(2)));

        assert_eq!(repo.get_by_code(&ctx(1), "acme001").unwrap().map(|p| p.id()), Some(acme.id()));
        assert_eq!(
            repo.get_by_code(&ctx(2), "acme001").unwrap().map(|p| p.id()),
            Some(other_tenant.id())
        );
    }

    #[test]
    fn partners_without_codes_never_conflict() {
        let (repo, _) = partners();
        repo.create(&ctx(1), PartnerDraft::new("One")).unwrap();
        repo.create(&ctx(1), PartnerDraft::new("Two")).unwrap();
        assert_eq!(repo.count(&ctx(1), &no_filters()).unwrap(), 2);
    }

    #[test]
    fn inactive_rows_keep_their_code() {
        let (repo, _) = partners();
        let old = repo.create(&ctx(1), PartnerDraft::new("Old").with_code("P1")).unwrap();
        repo.soft_delete(&ctx(1), old.id(), &no_filters()).unwrap();

        let err = repo
            .create(&ctx(1), PartnerDraft::new("New").with_code("p1"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        assert!(repo.restore(&ctx(1), old.id()).unwrap());
        assert_eq!(repo.get_by_code(&ctx(1), "P1").unwrap().map(|p| p.id()), Some(old.id()));
    }

    #[test]
    fn update_to_taken_code_conflicts_and_changes_nothing() {
        let (repo, _) = partners();
        repo.create(&ctx(1), PartnerDraft::new("A").with_code("A")).unwrap();
        let b = repo.create(&ctx(1), PartnerDraft::new("B").with_code("B")).unwrap();

        let patch = PartnerPatch {
            code: Some(Some("a".to_string())),
            ..PartnerPatch::default()
        };
        let err = repo.update(&ctx(1), b.id(), &patch, &no_filters()).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let stored = repo.fetch(&ctx(1), b.id()).unwrap();
        assert_eq!(stored, b);
    }

    #[test]
    fn update_validation_failure_leaves_row_untouched() {
        let (repo, events) = partners();
        let a = repo.create(&ctx(1), PartnerDraft::new("A")).unwrap();
        events.drain();

        let patch = PartnerPatch {
            partner_type: Some("reseller".to_string()),
            ..PartnerPatch::default()
        };
        let err = repo.update(&ctx(1), a.id(), &patch, &no_filters()).unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
        assert_eq!(repo.fetch(&ctx(1), a.id()).unwrap(), a);
        assert!(events.drain().is_empty());
    }

    #[test]
    fn reparenting_under_a_descendant_is_a_cycle() {
        let repo = Repository::<Category, _, _>::new(InMemoryEntityStore::new(), NoopSink);
        let a = repo.create(&ctx(1), CategoryDraft::new("A")).unwrap();
        let b = repo.create(&ctx(1), CategoryDraft::new("B").under(a.id())).unwrap();
        let c = repo.create(&ctx(1), CategoryDraft::new("C").under(b.id())).unwrap();

        let err = repo
            .update(&ctx(1), a.id(), &CategoryPatch::reparent(Some(c.id())), &no_filters())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Cycle(_)), "{err:?}");
        assert_eq!(repo.fetch(&ctx(1), a.id()).unwrap().parent_id, None);

        let self_parent = repo
            .update(&ctx(1), b.id(), &CategoryPatch::reparent(Some(b.id())), &no_filters())
            .unwrap_err();
        assert!(matches!(self_parent, RepositoryError::Cycle(_)));

        // Moving C to the root and then A under C is fine.
        repo.update(&ctx(1), c.id(), &CategoryPatch::reparent(None), &no_filters())
            .unwrap()
            .unwrap();
        let moved = repo
            .update(&ctx(1), a.id(), &CategoryPatch::reparent(Some(c.id())), &no_filters())
            .unwrap()
            .unwrap();
        assert_eq!(moved.parent_id, Some(c.id()));
    }

    #[test]
    fn partner_hierarchy_is_checked_too() {
        let (repo, _) = partners();
        let parent = repo.create(&ctx(1), PartnerDraft::new("Group")).unwrap();
        let branch = repo
            .create(&ctx(1), PartnerDraft::new("Branch").with_parent(parent.id()))
            .unwrap();

        let patch = PartnerPatch {
            parent_id: Some(Some(branch.id())),
            ..PartnerPatch::default()
        };
        assert!(matches!(
            repo.update(&ctx(1), parent.id(), &patch, &no_filters()),
            Err(RepositoryError::Cycle(_))
        ));
    }

    #[test]
    fn bulk_create_with_invalid_entry_persists_nothing() {
        let (repo, events) = partners();

        let err = repo
            .bulk_create(
                &ctx(1),
                vec![
                    PartnerDraft::new("A").with_code("X"),
                    PartnerDraft::new("").with_code("Y"),
                ],
            )
            .unwrap_err();

        match err {
            RepositoryError::Bulk(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 1);
            }
            other => panic!("expected bulk error, got {other:?}"),
        }
        assert_eq!(repo.count(&ctx(1), &no_filters().include_inactive()).unwrap(), 0);
        assert!(events.drain().is_empty());
    }

    #[test]
    fn bulk_create_persists_every_entry_and_publishes_each() {
        let (repo, events) = partners();

        let created = repo
            .bulk_create(
                &ctx(1),
                vec![PartnerDraft::new("A").with_code("X"), PartnerDraft::new("B")],
            )
            .unwrap();

        assert_eq!(created.len(), 2);
        assert!(created[0].id() < created[1].id());
        assert_eq!(repo.count(&ctx(1), &no_filters()).unwrap(), 2);

        let published = events.drain();
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|e| e.operation == Operation::Created));
    }

    #[test]
    fn pagination_breaks_ties_by_id() {
        let (repo, _) = partners();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(repo.create(&ctx(1), PartnerDraft::new("Same")).unwrap().id());
        }

        let mut seen = Vec::new();
        for number in 1..=3 {
            let page = repo
                .list(&ctx(1), &no_filters(), PageRequest::page(number, 2).unwrap(), None)
                .unwrap();
            assert_eq!(page.total, 5);
            assert_eq!(page.pages(), 3);
            seen.extend(page.items.iter().map(|p| p.id()));
        }
        assert_eq!(seen, ids);
    }

    #[test]
    fn explicit_ordering_and_unknown_fields() {
        let (repo, _) = partners();
        for name in ["b", "c", "a"] {
            repo.create(&ctx(1), PartnerDraft::new(name)).unwrap();
        }

        let order: OrderBy = "-name".parse().unwrap();
        let page = repo
            .list(&ctx(1), &no_filters(), PageRequest::default(), Some(&order))
            .unwrap();
        let names: Vec<&str> = page.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);

        let bad_order: OrderBy = "colour".parse().unwrap();
        assert!(matches!(
            repo.list(&ctx(1), &no_filters(), PageRequest::default(), Some(&bad_order)),
            Err(RepositoryError::Query(_))
        ));
        assert!(matches!(
            repo.count(&ctx(1), &no_filters().eq("colour", "red")),
            Err(RepositoryError::Query(_))
        ));
        assert!(matches!(
            repo.count(&ctx(1), &no_filters().search("x", ["colour"])),
            Err(RepositoryError::Query(_))
        ));
    }

    #[test]
    fn search_is_case_insensitive_and_ored_across_fields() {
        let (repo, _) = partners();
        repo.create(&ctx(1), PartnerDraft::new("Acme Trading").with_code("T1")).unwrap();
        repo.create(&ctx(1), PartnerDraft::new("Globex").with_code("ACME-2")).unwrap();
        repo.create(&ctx(1), PartnerDraft::new("Initech").with_type("supplier")).unwrap();
        repo.create(&ctx(2), PartnerDraft::new("Acme Foreign")).unwrap();

        let search = no_filters().search("acme", ["name", "code"]);
        assert_eq!(repo.count(&ctx(1), &search).unwrap(), 2);

        let narrowed = no_filters().search("acme", ["name", "code"]).eq("code", "T1");
        assert_eq!(repo.count(&ctx(1), &narrowed).unwrap(), 1);

        assert_eq!(repo.count(&ctx(1), &Partner::suppliers()).unwrap(), 1);
        assert_eq!(repo.count(&ctx(1), &Partner::customers()).unwrap(), 2);

        let either = no_filters().matching(FilterExpression::or(vec![
            FilterExpression::equals("name", "Globex"),
            FilterExpression::equals("name", "Initech"),
        ]));
        assert_eq!(repo.count(&ctx(1), &either).unwrap(), 2);
    }

    #[test]
    fn events_carry_subject_actor_and_changes() {
        let (repo, events) = partners();
        let actor = ctx(3).with_actor(UserId::new(42));

        let created = repo.create(&actor, PartnerDraft::new("ACME").with_code("a")).unwrap();
        let patch = PartnerPatch {
            name: Some("ACME Ltd".to_string()),
            ..PartnerPatch::default()
        };
        repo.update(&actor, created.id(), &patch, &no_filters()).unwrap();
        repo.soft_delete(&actor, created.id(), &no_filters()).unwrap();

        let published = events.drain();
        assert_eq!(published.len(), 3);

        let created_event = &published[0];
        assert_eq!(created_event.event_type(), "parties.partner.created");
        assert_eq!(created_event.subject.entity_id, created.id());
        assert_eq!(created_event.subject.tenant_id, Some(TenantId::new(3)));
        assert_eq!(created_event.subject.actor_user_id, Some(UserId::new(42)));
        assert!(created_event.before.is_none());
        assert!(created_event.changes.contains("name"));
        // Null in the (empty) before-snapshot and in the after-snapshot.
        assert!(!created_event.changes.contains("email"));

        let updated = &published[1];
        assert_eq!(updated.operation, Operation::Updated);
        let changed = updated.changes.without(&["updated_at"]);
        assert_eq!(changed.fields().collect::<Vec<_>>(), vec!["name"]);

        let deleted = &published[2];
        assert_eq!(deleted.operation, Operation::Deleted);
        assert!(deleted.changes.contains("is_active"));
    }

    #[test]
    fn global_entities_ignore_the_tenant() {
        let repo = Repository::<Company, _, _>::new(InMemoryEntityStore::new(), NoopSink);
        let acme = repo.create(&ctx(1), CompanyDraft::new("acme", "ACME")).unwrap();
        assert_eq!(acme.tenant_id(), None);

        assert_eq!(repo.get_by_id(&ctx(2), acme.id(), &no_filters()).unwrap(), Some(acme.clone()));
        assert!(matches!(
            repo.create(&ctx(2), CompanyDraft::new("ACME", "Other")),
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(acme.tenant(), Some(TenantId::new(acme.id().get())));
    }

    #[test]
    fn children_follow_default_menu_order() {
        let repo = Repository::<MenuItem, _, _>::new(InMemoryEntityStore::new(), NoopSink);
        let sales = repo.create(&ctx(1), MenuItemDraft::new("Sales")).unwrap();
        for (name, sequence) in [("Quotes", 20), ("Orders", 10), ("Customers", 20)] {
            repo.create(
                &ctx(1),
                MenuItemDraft {
                    sequence,
                    parent_id: Some(sales.id()),
                    ..MenuItemDraft::new(name)
                },
            )
            .unwrap();
        }

        let page = repo.children(&ctx(1), sales.id(), PageRequest::default()).unwrap();
        let names: Vec<&str> = page.items.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Orders", "Customers", "Quotes"]);

        let flat = Repository::<Item, _, _>::new(InMemoryEntityStore::new(), NoopSink);
        assert!(matches!(
            flat.children(&ctx(1), sales.id(), PageRequest::default()),
            Err(RepositoryError::Query(_))
        ));
    }

    #[test]
    fn items_filter_by_category() {
        let categories = Repository::<Category, _, _>::new(InMemoryEntityStore::new(), NoopSink);
        let items = Repository::<Item, _, _>::new(InMemoryEntityStore::new(), NoopSink);
        let hardware = categories.create(&ctx(1), CategoryDraft::new("Hardware")).unwrap();

        items
            .create(
                &ctx(1),
                ItemDraft {
                    category_id: Some(hardware.id()),
                    ..ItemDraft::new("b-2", "Bolt")
                },
            )
            .unwrap();
        items.create(&ctx(1), ItemDraft::new("s-1", "Service hour")).unwrap();

        let page = items
            .list(&ctx(1), &Item::in_category(hardware.id()), PageRequest::default(), None)
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].code, "B-2");
        assert_eq!(items.get_by_id(&ctx(1), EntityId::new(99), &no_filters()).unwrap(), None);
    }

    fn contact(partner_id: EntityId, name: &str) -> ContactDraft {
        ContactDraft {
            partner_id,
            name: name.to_string(),
            position: None,
            email: None,
            phone: None,
            is_primary: false,
        }
    }

    #[test]
    fn contacts_must_point_at_a_partner_of_the_same_tenant() {
        let partners = Arc::new(Repository::<Partner, _, _>::new(InMemoryEntityStore::new(), NoopSink));
        let contacts = Repository::<PartnerContact, _, _>::new(InMemoryEntityStore::new(), NoopSink)
            .with_reference("partner_id", partners.clone());

        let own = partners.create(&ctx(1), PartnerDraft::new("ACME")).unwrap();
        let foreign = partners.create(&ctx(2), PartnerDraft::new("Globex")).unwrap();

        let jane = contacts.create(&ctx(1), contact(own.id(), "Jane")).unwrap();
        assert_eq!(jane.partner_id, own.id());

        for missing in [foreign.id(), EntityId::new(99)] {
            assert!(matches!(
                contacts.create(&ctx(1), contact(missing, "John")),
                Err(RepositoryError::Validation(_))
            ));
        }
        assert_eq!(contacts.count(&ctx(1), &no_filters().include_inactive()).unwrap(), 1);

        let err = contacts
            .bulk_create(&ctx(1), vec![contact(own.id(), "A"), contact(foreign.id(), "B")])
            .unwrap_err();
        match err {
            RepositoryError::Bulk(failures) => {
                assert_eq!(failures.iter().map(|f| f.index).collect::<Vec<_>>(), vec![1]);
            }
            other => panic!("expected bulk error, got {other:?}"),
        }
    }

    #[test]
    fn item_category_is_checked_when_it_changes() {
        let categories = Arc::new(Repository::<Category, _, _>::new(InMemoryEntityStore::new(), NoopSink));
        let items = Repository::<Item, _, _>::new(InMemoryEntityStore::new(), NoopSink)
            .with_reference("category_id", categories.clone());

        let tools = categories.create(&ctx(1), CategoryDraft::new("Tools")).unwrap();
        let other_tenant = categories.create(&ctx(2), CategoryDraft::new("Tools")).unwrap();
        let bolt = items
            .create(
                &ctx(1),
                ItemDraft {
                    category_id: Some(tools.id()),
                    ..ItemDraft::new("b-1", "Bolt")
                },
            )
            .unwrap();

        // Unchanged references are not looked up again.
        categories.soft_delete(&ctx(1), tools.id(), &no_filters()).unwrap();
        let renamed = items
            .update(
                &ctx(1),
                bolt.id(),
                &ItemPatch {
                    name: Some("Hex bolt".to_string()),
                    ..ItemPatch::default()
                },
                &no_filters(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(renamed.category_id, Some(tools.id()));

        let moved = items.update(
            &ctx(1),
            bolt.id(),
            &ItemPatch {
                category_id: Some(Some(other_tenant.id())),
                ..ItemPatch::default()
            },
            &no_filters(),
        );
        assert!(matches!(moved, Err(RepositoryError::Validation(_))));
        assert_eq!(items.fetch(&ctx(1), bolt.id()).unwrap().category_id, Some(tools.id()));
    }

    #[test]
    fn configured_page_cap_applies_to_lists() {
        let config = InfraConfig {
            max_page_size: 2,
            ..InfraConfig::default()
        };
        let repo: Repository<Partner, _, _> = config.repository(InMemoryEntityStore::new(), NoopSink);
        for name in ["A", "B", "C"] {
            repo.create(&ctx(1), PartnerDraft::new(name)).unwrap();
        }

        let page = repo
            .list(&ctx(1), &no_filters(), PageRequest::page(1, 50).unwrap(), None)
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 48, ..ProptestConfig::default() })]

            #[test]
            fn page_lengths_sum_to_count(
                rows in prop::collection::vec((0usize..3, 0usize..4, any::<bool>()), 0..30),
                limit in 1u64..8,
                only_type in prop::option::of(0usize..4),
            ) {
                const NAMES: [&str; 3] = ["alpha", "beta", "gamma"];
                let (repo, _) = partners();

                for (name, kind, delete) in &rows {
                    let created = repo
                        .create(&ctx(1), PartnerDraft::new(NAMES[*name]).with_type(bof_parties::PartnerType::NAMES[*kind]))
                        .unwrap();
                    if *delete {
                        repo.soft_delete(&ctx(1), created.id(), &Filters::default()).unwrap();
                    }
                }

                let filters = match only_type {
                    Some(kind) => Filters::new().eq("partner_type", bof_parties::PartnerType::NAMES[kind]),
                    None => Filters::new(),
                };
                let total = repo.count(&ctx(1), &filters).unwrap();

                let mut seen = 0u64;
                let mut ids = Vec::new();
                let mut skip = 0u64;
                loop {
                    let page = repo
                        .list(&ctx(1), &filters, PageRequest::new(skip, limit).unwrap(), None)
                        .unwrap();
                    prop_assert_eq!(page.total, total);
                    if page.items.is_empty() {
                        break;
                    }
                    seen += page.items.len() as u64;
                    ids.extend(page.items.iter().map(|p| p.id()));
                    skip += limit;
                }

                prop_assert_eq!(seen, total);
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len() as u64, total);
            }
        }
    }
}
