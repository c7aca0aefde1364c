use chrono::Utc;
use rust_decimal::Decimal;

use super::*;
use crate::entities::{
    Customer, CustomerPatch, ItemType, MovementType, NewCustomer, NewMovement, NewPart,
    NewServiceItem, NewServiceOrder, NewShop, NewVehicle, NotificationType, OrderStatus,
    ServiceOrder, ServiceOrderPatch, UserRole, Vehicle,
};
use crate::reports::{self, DateRange, ReportFilters};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn store_with_shop(name: &str) -> Store {
    let mut store = Store::open_in_memory().unwrap();
    store.set_actor("tester");
    store
        .create_shop(NewShop {
            name: name.into(),
            ..Default::default()
        })
        .unwrap();
    store.select_shop(name).unwrap();
    store
}

fn customer(store: &mut Store, name: &str) -> Customer {
    store
        .create_customer(NewCustomer {
            name: name.into(),
            ..Default::default()
        })
        .unwrap()
}

fn vehicle(store: &mut Store, owner: &Customer, plate: &str) -> Vehicle {
    store
        .create_vehicle(NewVehicle {
            customer_id: Some(owner.id.clone()),
            plate: plate.into(),
            make: "Fiat".into(),
            model: "Uno".into(),
            year: Some(2015),
            ..Default::default()
        })
        .unwrap()
}

fn order(store: &mut Store, vehicle: &Vehicle, notes: Option<&str>) -> ServiceOrder {
    store
        .create_order(NewServiceOrder {
            vehicle_id: Some(vehicle.id.clone()),
            description: "Revisão".into(),
            notes: notes.map(String::from),
            ..Default::default()
        })
        .unwrap()
}

fn service(description: &str, service_type: &str, price: &str) -> NewServiceItem {
    NewServiceItem {
        item_type: ItemType::Service,
        service_type: Some(service_type.into()),
        description: description.into(),
        quantity: Decimal::ONE,
        unit_price: dec(price),
        part_id: None,
    }
}

fn stocked_part(store: &mut Store, code: &str, on_hand: &str, min: &str) -> crate::entities::Part {
    let part = store
        .create_part(NewPart {
            code: code.into(),
            name: format!("Peça {}", code),
            sale_price: dec("35.00"),
            min_quantity: dec(min),
            ..Default::default()
        })
        .unwrap();
    store
        .record_movement(code, NewMovement::new(MovementType::Entry, dec(on_hand)))
        .unwrap();
    store.get_part(&part.code).unwrap()
}

#[test]
fn test_order_numbers_sequential_per_shop() {
    let mut store = store_with_shop("Oficina A");
    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1234");
    assert_eq!(order(&mut store, &car, None).order_number, 1);
    assert_eq!(order(&mut store, &car, None).order_number, 2);

    store
        .create_shop(NewShop {
            name: "Oficina B".into(),
            ..Default::default()
        })
        .unwrap();
    store.select_shop("Oficina B").unwrap();
    let bia = customer(&mut store, "Bia");
    let other = vehicle(&mut store, &bia, "ABC1234");
    assert_eq!(order(&mut store, &other, None).order_number, 1);
}

#[test]
fn test_order_lifecycle_and_history() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1D23");
    let so = order(&mut store, &car, None);
    assert_eq!(so.customer_id, ana.id);

    for next in [OrderStatus::Approved, OrderStatus::InProgress, OrderStatus::Completed] {
        store.change_status("#1", next, None).unwrap();
    }
    let done = store.get_order("1").unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert!(done.completed_at.is_some());

    let history = store.status_history(&so.id.to_string()).unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].from_status, None);
    assert_eq!(history[0].to_status, OrderStatus::Pending);
    assert_eq!(history[3].from_status, Some(OrderStatus::InProgress));
    assert_eq!(history[3].changed_by, "tester");

    let err = store
        .change_status("#1", OrderStatus::Pending, None)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
    let err = store
        .add_item("#1", service("Extra", "Revisão", "10"))
        .unwrap_err();
    assert!(matches!(err, StoreError::OrderClosed { number: 1, .. }));
}

#[test]
fn test_same_state_transition_rejected() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1234");
    order(&mut store, &car, None);
    assert!(store.change_status("#1", OrderStatus::Pending, None).is_err());
    assert!(store.change_status("#1", OrderStatus::Completed, None).is_err());
    assert!(store.change_status("#1", OrderStatus::Canceled, None).is_ok());
}

#[test]
fn test_items_recompute_total() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1234");
    order(&mut store, &car, None);

    store.add_item("#1", service("Troca de óleo", "Revisão", "120.00")).unwrap();
    let brakes = store
        .add_item(
            "#1",
            NewServiceItem {
                quantity: dec("2"),
                ..service("Pastilha", "Freios", "90.00")
            },
        )
        .unwrap();
    assert_eq!(brakes.total_price, dec("180.00"));
    assert_eq!(store.get_order("#1").unwrap().total_amount, dec("300.00"));

    let updated = store
        .update_order(
            "#1",
            ServiceOrderPatch {
                discount: Some(dec("50")),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.total_amount, dec("250.00"));

    store.remove_item(&brakes.id.to_string()).unwrap();
    assert_eq!(store.get_order("#1").unwrap().total_amount, dec("70.00"));
    assert_eq!(store.list_items("#1").unwrap().len(), 1);
}

#[test]
fn test_discount_larger_than_items_floors_at_zero() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1234");
    order(&mut store, &car, None);
    store.add_item("#1", service("Diagnóstico", "Elétrica", "40")).unwrap();
    let so = store
        .update_order(
            "#1",
            ServiceOrderPatch {
                discount: Some(dec("100")),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(so.total_amount, Decimal::ZERO);
}

#[test]
fn test_part_item_moves_stock_both_ways() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1234");
    let so = order(&mut store, &car, None);
    let filter = stocked_part(&mut store, "FLT-01", "10", "2");

    let item = store
        .add_item(
            "#1",
            NewServiceItem {
                quantity: dec("3"),
                part_id: Some(filter.id.clone()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(item.item_type, ItemType::Part);
    assert_eq!(item.description, filter.name);
    assert_eq!(item.total_price, dec("105.00"));
    assert_eq!(store.get_part("FLT-01").unwrap().quantity, dec("7"));

    let movements = store.list_movements(Some("flt-01"), None).unwrap();
    assert_eq!(movements[0].movement_type, MovementType::Exit);
    assert_eq!(movements[0].previous_quantity, dec("10"));
    assert_eq!(movements[0].new_quantity, dec("7"));
    assert_eq!(movements[0].order_id.as_ref(), Some(&so.id));

    store.remove_item(&item.id.to_string()).unwrap();
    assert_eq!(store.get_part("FLT-01").unwrap().quantity, dec("10"));
    let movements = store.list_movements(Some("FLT-01"), None).unwrap();
    assert_eq!(movements.len(), 3);
    assert_eq!(movements[0].movement_type, MovementType::Return);
}

#[test]
fn test_exit_below_zero_rejected() {
    let mut store = store_with_shop("Oficina");
    stocked_part(&mut store, "VELA", "4", "0");

    let err = store
        .record_movement("VELA", NewMovement::new(MovementType::Exit, dec("5")))
        .unwrap_err();
    assert!(matches!(err, StoreError::InsufficientStock { .. }));
    assert_eq!(store.get_part("VELA").unwrap().quantity, dec("4"));
    assert_eq!(store.list_movements(Some("VELA"), None).unwrap().len(), 1);

    let counted = store
        .record_movement("VELA", NewMovement::new(MovementType::Adjustment, dec("0")))
        .unwrap();
    assert_eq!(counted.previous_quantity, dec("4"));
    assert_eq!(counted.new_quantity, Decimal::ZERO);
}

#[test]
fn test_entry_past_decimal_range_rejected() {
    let mut store = store_with_shop("Oficina");
    stocked_part(&mut store, "ARRUELA", "1", "0");
    store
        .record_movement("ARRUELA", NewMovement::new(MovementType::Adjustment, Decimal::MAX))
        .unwrap();

    let err = store
        .record_movement("ARRUELA", NewMovement::new(MovementType::Entry, dec("1")))
        .unwrap_err();
    match err {
        StoreError::Validation(errors) => assert!(errors.has("quantity")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.get_part("ARRUELA").unwrap().quantity, Decimal::MAX);
}

#[test]
fn test_low_stock_notified_once_on_crossing() {
    let mut store = store_with_shop("Oficina");
    stocked_part(&mut store, "OLEO", "10", "5");
    let low_stock = NotificationFilter {
        notification_type: Some(NotificationType::LowStock),
        ..Default::default()
    };
    assert!(store.list_notifications(&low_stock).unwrap().is_empty());

    store
        .record_movement("OLEO", NewMovement::new(MovementType::Exit, dec("5")))
        .unwrap();
    store
        .record_movement("OLEO", NewMovement::new(MovementType::Exit, dec("1")))
        .unwrap();

    let notes = store.list_notifications(&low_stock).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].user_id, None);
    assert!(notes[0].title.contains("OLEO"));
    assert!(store.list_parts(&PartFilter { low_stock: true, ..Default::default() }).unwrap().len() == 1);
}

#[test]
fn test_low_stock_notifications_can_be_disabled() {
    let mut store = store_with_shop("Oficina");
    store.set_low_stock_notifications(false);
    stocked_part(&mut store, "OLEO", "6", "5");
    store
        .record_movement("OLEO", NewMovement::new(MovementType::Exit, dec("3")))
        .unwrap();
    assert_eq!(store.unread_count(None).unwrap(), 0);
}

#[test]
fn test_fan_out_respects_preferences() {
    let mut store = store_with_shop("Oficina");
    let rui = store.add_user("Rui", "rui@oficina.com", UserRole::Mechanic).unwrap();
    let eva = store.add_user("Eva", "eva@oficina.com", UserRole::Receptionist).unwrap();
    store
        .set_preference("eva@oficina.com", NotificationType::OrderStatus, false)
        .unwrap();

    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1234");
    order(&mut store, &car, None);
    store.change_status("#1", OrderStatus::Approved, None).unwrap();

    let for_rui = store
        .list_notifications(&NotificationFilter {
            user_id: Some(rui.id.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(for_rui.len(), 1);
    assert_eq!(for_rui[0].notification_type, NotificationType::OrderStatus);

    let for_eva = store
        .list_notifications(&NotificationFilter {
            user_id: Some(eva.id.clone()),
            ..Default::default()
        })
        .unwrap();
    assert!(for_eva.is_empty());

    let prefs = store.effective_preferences(&eva.id.to_string()).unwrap();
    assert!(prefs.contains(&(NotificationType::OrderStatus, false)));
    assert!(prefs.contains(&(NotificationType::LowStock, true)));
}

#[test]
fn test_read_state() {
    let mut store = store_with_shop("Oficina");
    let rui = store.add_user("Rui", "rui@oficina.com", UserRole::Mechanic).unwrap();
    for title in ["Um", "Dois", "Três"] {
        store
            .create_notification(crate::entities::NewNotification::new(
                NotificationType::System,
                title,
                "mensagem",
            ))
            .unwrap();
    }
    assert_eq!(store.unread_count(Some(&rui.id)).unwrap(), 3);

    let first = store.list_notifications(&NotificationFilter::default()).unwrap()[0].clone();
    let read = store.mark_read(&first.id.to_string()).unwrap();
    assert!(read.is_read());
    assert_eq!(store.unread_count(Some(&rui.id)).unwrap(), 2);

    assert_eq!(store.mark_all_read(Some(&rui.id)).unwrap(), 2);
    assert_eq!(store.unread_count(None).unwrap(), 0);

    store.delete_notification(&first.id.to_string()).unwrap();
    assert_eq!(store.list_notifications(&NotificationFilter::default()).unwrap().len(), 2);
}

#[test]
fn test_mark_all_read_publishes_each_notification() {
    let mut store = store_with_shop("Oficina");
    store.add_user("Rui", "rui@oficina.com", UserRole::Mechanic).unwrap();
    for title in ["Um", "Dois", "Três"] {
        store
            .create_notification(crate::entities::NewNotification::new(
                NotificationType::System,
                title,
                "mensagem",
            ))
            .unwrap();
    }
    let all = store.list_notifications(&NotificationFilter::default()).unwrap();
    store.mark_read(&all[0].id.to_string()).unwrap();
    let mut unread: Vec<String> = all[1..].iter().map(|n| n.id.to_string()).collect();
    unread.sort();

    let events = store.subscribe_to(&["notifications"]);
    assert_eq!(store.mark_all_read(None).unwrap(), unread.len());

    let mut published: Vec<String> = events.try_iter().map(|e| e.row_id).collect();
    published.sort();
    assert_eq!(published, unread);

    assert_eq!(store.mark_all_read(None).unwrap(), 0);
    assert!(events.try_iter().next().is_none());
}

#[test]
fn test_cached_reads_refresh_after_mutation() {
    let mut store = store_with_shop("Oficina");
    let events = store.subscribe_to(&["customers"]);
    customer(&mut store, "Ana");
    assert_eq!(store.list_customers(&CustomerFilter::default()).unwrap().len(), 1);

    let bia = customer(&mut store, "Bia");
    assert_eq!(store.list_customers(&CustomerFilter::default()).unwrap().len(), 2);

    store
        .update_customer(
            &bia.id.to_string(),
            CustomerPatch {
                name: Some("Beatriz".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(store.get_customer(&bia.id.to_string()).unwrap().name, "Beatriz");
    assert_eq!(events.try_iter().count(), 3);
}

#[test]
fn test_shops_do_not_see_each_other() {
    let mut store = store_with_shop("Oficina A");
    let ana = customer(&mut store, "Ana");
    vehicle(&mut store, &ana, "ABC1234");

    store
        .create_shop(NewShop {
            name: "Oficina B".into(),
            ..Default::default()
        })
        .unwrap();
    store.select_shop("Oficina B").unwrap();

    assert!(store.list_customers(&CustomerFilter::default()).unwrap().is_empty());
    assert!(matches!(
        store.get_customer(&ana.id.to_string()),
        Err(StoreError::NotFound { .. })
    ));
    assert!(store.get_vehicle("ABC1234").is_err());
    let err = store
        .create_vehicle(NewVehicle {
            customer_id: Some(ana.id.clone()),
            plate: "XYZ9876".into(),
            make: "VW".into(),
            model: "Gol".into(),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn test_lookup_by_natural_keys() {
    let mut store = store_with_shop("Oficina");
    let ana = store
        .create_customer(NewCustomer {
            name: "Ana".into(),
            cpf: Some("529.982.247-25".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(ana.cpf.as_deref(), Some("52998224725"));
    assert_eq!(store.get_customer("529.982.247-25").unwrap().id, ana.id);

    vehicle(&mut store, &ana, "abc-1d23");
    assert_eq!(store.get_vehicle("ABC1D23").unwrap().customer_id, ana.id);

    let dup = store.create_customer(NewCustomer {
        name: "Outra".into(),
        cpf: Some("52998224725".into()),
        ..Default::default()
    });
    assert!(matches!(dup, Err(StoreError::Constraint(_))));
}

#[test]
fn test_order_rejects_vehicle_of_other_customer() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let bia = customer(&mut store, "Bia");
    let car = vehicle(&mut store, &ana, "ABC1234");
    let err = store
        .create_order(NewServiceOrder {
            customer_id: Some(bia.id.clone()),
            vehicle_id: Some(car.id.clone()),
            description: "Troca".into(),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn test_order_mileage_only_moves_forward() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1234");
    for km in [52_000, 48_000] {
        store
            .create_order(NewServiceOrder {
                vehicle_id: Some(car.id.clone()),
                description: "Revisão".into(),
                mileage: Some(km),
                ..Default::default()
            })
            .unwrap();
    }
    assert_eq!(store.get_vehicle("ABC1234").unwrap().mileage, Some(52_000));
}

#[test]
fn test_delete_customer_cascades() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1234");
    order(&mut store, &car, None);
    store.add_item("#1", service("Alinhamento", "Suspensão", "80")).unwrap();

    let history = store.customer_history(&ana.id.to_string()).unwrap();
    assert_eq!(history.vehicles.len(), 1);
    assert_eq!(history.orders.len(), 1);

    store.delete_customer(&ana.id.to_string()).unwrap();
    assert!(store.list_vehicles(&VehicleFilter::default()).unwrap().is_empty());
    assert!(store.list_orders(&OrderFilter::default()).unwrap().is_empty());
}

#[test]
fn test_report_from_stored_orders() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let bia = customer(&mut store, "Bia");
    let uno = vehicle(&mut store, &ana, "ABC1234");
    let gol = vehicle(&mut store, &bia, "XYZ9876");

    order(&mut store, &uno, Some("Técnico: Carlos"));
    store.add_item("#1", service("Troca de óleo", "Revisão", "150.00")).unwrap();
    order(&mut store, &gol, Some("Técnico: Davi"));
    store.add_item("#2", service("Pastilhas", "Freios", "220.00")).unwrap();
    order(&mut store, &gol, None);
    store.add_item("#3", service("Disco", "Freios", "500.00")).unwrap();
    store.change_status("#3", OrderStatus::Canceled, None).unwrap();

    let today = Utc::now().date_naive();
    let period = DateRange::last_days(today, 30).unwrap();
    let data = reports::build(&store, period, &ReportFilters::default()).unwrap();
    assert_eq!(data.summary.total_orders, 3);
    assert_eq!(data.summary.total_revenue, dec("370.00"));
    assert_eq!(data.customers[0].name, "Bia");
    assert_eq!(data.vehicles[0].vehicle, "Fiat Uno (2015)");
    let technicians: Vec<_> = data.technicians.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(technicians, vec!["Davi", "Carlos"]);

    let brakes = reports::build(
        &store,
        period,
        &ReportFilters {
            service_type: Some("freios".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(brakes.summary.total_orders, 2);
    assert_eq!(brakes.summary.total_revenue, dec("220.00"));

    let comparison = reports::compare(&store, period, &ReportFilters::default()).unwrap();
    assert_eq!(comparison.previous.summary.total_orders, 0);
    assert_eq!(comparison.changes.total_revenue, Decimal::ONE_HUNDRED);
}

#[test]
fn test_report_sees_items_added_after_first_fetch() {
    let mut store = store_with_shop("Oficina");
    let ana = customer(&mut store, "Ana");
    let car = vehicle(&mut store, &ana, "ABC1234");
    order(&mut store, &car, None);
    let period = DateRange::last_days(Utc::now().date_naive(), 7).unwrap();

    let before = reports::build(&store, period, &ReportFilters::default()).unwrap();
    assert_eq!(before.summary.total_revenue, Decimal::ZERO);

    store.add_item("#1", service("Balanceamento", "Suspensão", "60")).unwrap();
    let after = reports::build(&store, period, &ReportFilters::default()).unwrap();
    assert_eq!(after.summary.total_revenue, dec("60"));
}

#[test]
fn test_operations_require_a_shop() {
    let mut store = Store::open_in_memory().unwrap();
    assert!(matches!(
        store.create_customer(NewCustomer {
            name: "Ana".into(),
            ..Default::default()
        }),
        Err(StoreError::NoShopSelected)
    ));
}
