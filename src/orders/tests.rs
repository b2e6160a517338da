use super::*;
use crate::collaborators::memory::{
    InMemoryCustomerDirectory, InMemoryDocumentExporter, InMemoryOrderStore, InMemoryProductCatalog,
    InMemoryTariffLookup, Submission,
};
use crate::collaborators::{Customer, LookupError, Product, StorageError};
use crate::config::EngineConfig;
use crate::freight::FreightTariff;
use crate::money::Money;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

const PARISH: CustomerId = CustomerId(1);
const CHAPEL: CustomerId = CustomerId(2);

fn parish() -> Customer {
    Customer {
        id: PARISH,
        name: "Paróquia São José".to_string(),
        discount_percent: None,
    }
}

fn chapel() -> Customer {
    Customer {
        id: CHAPEL,
        name: "Capela Santa Luzia".to_string(),
        discount_percent: Some(dec!(5)),
    }
}

fn product(id: i64, name: &str, price_cents: i64, weight: Decimal) -> Product {
    Product {
        id: ProductId(id),
        name: name.to_string(),
        unit_price: Money::from_cents(price_cents),
        unit_weight: weight,
        active: true,
    }
}

/// base 10.00, 3.00 per started 1000 above 2000
fn threshold_tariff() -> FreightTariff {
    FreightTariff::banded(Money::from_cents(1000), dec!(1000), Money::from_cents(300))
        .unwrap()
        .with_minimum_weight(dec!(2000))
        .unwrap()
}

struct Fixture {
    tariffs: Arc<InMemoryTariffLookup>,
    orders: Arc<InMemoryOrderStore>,
    documents: Arc<InMemoryDocumentExporter>,
    collaborators: Collaborators,
}

fn fixture_with(tariffs: InMemoryTariffLookup, orders: InMemoryOrderStore) -> Fixture {
    let tariffs = Arc::new(tariffs);
    let orders = Arc::new(orders);
    let documents = Arc::new(InMemoryDocumentExporter::new());
    let products = vec![
        product(10, "Vela votiva", 250, dec!(120)),
        product(11, "Vela de sete dias", 1200, dec!(400)),
        Product {
            active: false,
            ..product(12, "Vela aromática", 900, dec!(200))
        },
        product(20, "Terço de madeira", 1500, dec!(50)),
    ];

    let collaborators = Collaborators {
        customers: Arc::new(InMemoryCustomerDirectory::new(vec![parish(), chapel()])),
        tariffs: tariffs.clone(),
        products: Arc::new(InMemoryProductCatalog::new(products)),
        orders: orders.clone(),
        documents: documents.clone(),
    };

    Fixture {
        tariffs,
        orders,
        documents,
        collaborators,
    }
}

fn fixture() -> Fixture {
    fixture_with(
        InMemoryTariffLookup::new()
            .with_tariff(PARISH, threshold_tariff())
            .with_tariff(CHAPEL, FreightTariff::flat(Money::from_cents(800))),
        InMemoryOrderStore::new(),
    )
}

fn session(fixture: &Fixture) -> OrderSession {
    OrderSession::new(fixture.collaborators.clone(), EngineConfig::default())
}

#[tokio::test]
async fn test_zero_state_before_tariff() {
    let fixture = fixture();
    let mut session = session(&fixture);
    assert_eq!(session.tariff_status(), &TariffStatus::NotRequested);

    let totals = session
        .add_product(&product(11, "Vela de sete dias", 1200, dec!(400)))
        .unwrap();
    assert_eq!(totals.freight, Money::ZERO);
    assert_eq!(totals.grand_total, Money::from_cents(1200));
    assert_eq!(session.draft().state(), DraftState::Editing);
}

#[tokio::test]
async fn test_grand_total_with_flat_freight() {
    let fixture = fixture();
    let mut session = session(&fixture);
    session
        .change_customer(&Customer {
            discount_percent: None,
            ..chapel()
        })
        .await
        .unwrap();

    session.add_product(&product(1, "A", 1000, dec!(0))).unwrap();
    session.add_product(&product(1, "A", 1000, dec!(0))).unwrap();
    session.add_product(&product(2, "B", 2500, dec!(0))).unwrap();
    let totals = session.set_discount(dec!(10)).unwrap();

    assert_eq!(session.draft().items().len(), 2);
    assert_eq!(totals.subtotal, Money::from_cents(4500));
    assert_eq!(totals.discount_amount, Money::from_cents(450));
    assert_eq!(totals.freight, Money::from_cents(800));
    assert_eq!(totals.grand_total, Money::from_cents(4850));
    assert_eq!(session.tariff_status(), &TariffStatus::Loaded);
}

#[tokio::test]
async fn test_customer_default_discount_on_new_order() {
    let fixture = fixture();
    let mut session = session(&fixture);
    session.change_customer(&chapel()).await.unwrap();
    assert_eq!(session.draft().discount_percent(), dec!(5));
}

#[tokio::test]
async fn test_late_tariff_prices_current_items() {
    let gate = Arc::new(Notify::new());
    let fixture = fixture_with(
        InMemoryTariffLookup::new()
            .with_tariff(PARISH, threshold_tariff())
            .with_gate(gate.clone()),
        InMemoryOrderStore::new(),
    );
    let mut session = session(&fixture);
    session.add_product(&product(11, "Vela de sete dias", 1200, dec!(400))).unwrap();

    let request = session.select_customer(&parish()).unwrap();
    assert_eq!(session.tariff_status(), &TariffStatus::Pending);
    let in_flight = tokio::spawn(request.resolve());

    // 1 × 400 when requested, 7 × 400 = 2800 by the time it resolves
    session.set_quantity(0, dec!(7)).unwrap();
    gate.notify_one();
    let resolved = in_flight.await.unwrap();

    let applied = session.apply_tariff(resolved).unwrap();
    let TariffApplication::Applied(totals) = applied else {
        panic!("expected the tariff to be applied");
    };
    assert_eq!(totals.total_weight, dec!(2800));
    assert_eq!(totals.freight, Money::from_cents(1300));
    assert_eq!(totals.grand_total, Money::from_cents(8400 + 1300));
}

#[tokio::test]
async fn test_superseded_tariff_is_dropped() {
    let fixture = fixture();
    let mut session = session(&fixture);

    let first = session.select_customer(&parish()).unwrap();
    let second = session.select_customer(&chapel()).unwrap();
    let first = first.resolve().await;
    let second = second.resolve().await;

    session.apply_tariff(second).unwrap();
    assert_eq!(session.apply_tariff(first).unwrap(), TariffApplication::Superseded);
    assert_eq!(session.draft().tariff(), Some(&FreightTariff::flat(Money::from_cents(800))));
    assert_eq!(session.totals().freight, Money::from_cents(800));
}

#[tokio::test]
async fn test_customer_without_tariff() {
    let fixture = fixture_with(InMemoryTariffLookup::new(), InMemoryOrderStore::new());
    let mut session = session(&fixture);
    let totals = session.change_customer(&parish()).await.unwrap();
    assert_eq!(totals.freight, Money::ZERO);
    assert_eq!(session.tariff_status(), &TariffStatus::Unavailable);
}

#[tokio::test]
async fn test_failed_lookup_keeps_draft_editable() {
    let fixture = fixture();
    fixture.tariffs.fail_with(Some("connection reset"));
    let mut session = session(&fixture);

    let err = session.change_customer(&parish()).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Lookup(LookupError::Unavailable("connection reset".to_string()))
    );
    assert!(matches!(session.tariff_status(), TariffStatus::Failed(_)));
    assert_eq!(session.draft().customer().map(|c| c.id), Some(PARISH));

    let totals = session.add_product(&product(11, "Vela de sete dias", 1200, dec!(3000))).unwrap();
    assert_eq!(totals.freight, Money::ZERO);

    fixture.tariffs.fail_with(None);
    let totals = session.refresh_tariff().await.unwrap();
    assert_eq!(totals.freight, Money::from_cents(1300));
    assert_eq!(session.tariff_status(), &TariffStatus::Loaded);
}

#[tokio::test]
async fn test_unpriceable_tariff_is_reported() {
    let tiny_brackets =
        FreightTariff::banded(Money::ZERO, dec!(0.0000000000000000000001), Money::from_cents(100)).unwrap();
    let fixture = fixture_with(
        InMemoryTariffLookup::new().with_tariff(PARISH, tiny_brackets),
        InMemoryOrderStore::new(),
    );
    let mut session = session(&fixture);
    session.add_product(&product(30, "Sino de bronze", 90000, dec!(10000000))).unwrap();

    let err = session.change_customer(&parish()).await.unwrap_err();
    assert_eq!(err, SessionError::Draft(DraftError::AmountOverflow));
    assert_eq!(
        session.tariff_status(),
        &TariffStatus::Failed("Amount too large to compute".to_string())
    );
    assert!(session.draft().tariff().is_none());
    assert_eq!(session.totals().freight, Money::ZERO);
    assert_eq!(session.totals().grand_total, Money::from_cents(90000));
}

#[tokio::test]
async fn test_select_customer_by_id() {
    let fixture = fixture();
    let mut session = session(&fixture);
    session.select_customer_by_id(PARISH).await.unwrap();
    assert_eq!(
        session.draft().customer().map(|c| c.name.as_str()),
        Some("Paróquia São José")
    );

    let err = session.select_customer_by_id(CustomerId(404)).await.unwrap_err();
    assert_eq!(err, SessionError::Lookup(LookupError::CustomerNotFound(CustomerId(404))));
}

#[tokio::test]
async fn test_submit_validation_does_not_mutate() {
    let fixture = fixture();
    let mut session = session(&fixture);

    assert_eq!(
        session.submit().await,
        Err(SessionError::Draft(DraftError::MissingCustomer))
    );

    session.change_customer(&parish()).await.unwrap();
    assert_eq!(session.submit().await, Err(SessionError::Draft(DraftError::EmptyOrder)));

    session.add_product(&product(10, "Vela votiva", 250, dec!(120))).unwrap();
    session.set_quantity(0, Decimal::ZERO).unwrap();
    let before = session.draft().clone();
    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, SessionError::Draft(ref e) if e.is_submission_error()));
    assert_eq!(session.draft(), &before);
    assert!(fixture.orders.submissions().is_empty());
}

#[tokio::test]
async fn test_submit_creates_then_updates() {
    let fixture = fixture();
    let mut session = session(&fixture);
    session.change_customer(&parish()).await.unwrap();
    session.add_product(&product(10, "Vela votiva", 250, dec!(120))).unwrap();
    session.set_note("Retirar na sacristia");

    let order_id = session.submit().await.unwrap();
    assert_eq!(session.draft().state(), DraftState::Saved);
    assert_eq!(session.draft().order_id(), Some(order_id));

    session.set_quantity(0, dec!(4)).unwrap();
    assert_eq!(session.draft().state(), DraftState::Editing);
    assert_eq!(session.submit().await, Ok(order_id));

    let submissions = fixture.orders.submissions();
    assert_eq!(submissions.len(), 2);
    assert!(matches!(&submissions[0], Submission::Create(p) if p.note == "Retirar na sacristia"));
    match &submissions[1] {
        Submission::Update(id, payload) => {
            assert_eq!(*id, order_id);
            assert_eq!(payload.items[0].quantity, dec!(4));
            assert_eq!(payload.grand_total, Money::from_cents(1000 + 1000));
        }
        other => panic!("expected an update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_storage_failure_leaves_draft_intact() {
    let fixture = fixture();
    let mut session = session(&fixture);
    session.change_customer(&parish()).await.unwrap();
    session.add_product(&product(10, "Vela votiva", 250, dec!(120))).unwrap();
    let before = session.totals();

    fixture.orders.fail_with(Some("503 Service Unavailable"));
    let err = session.submit().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Order storage unreachable: 503 Service Unavailable"
    );
    assert_eq!(err, SessionError::Storage(StorageError::Unreachable("503 Service Unavailable".to_string())));
    assert_eq!(session.draft().state(), DraftState::Editing);
    assert_eq!(session.draft().order_id(), None);
    assert_eq!(session.totals(), before);

    fixture.orders.fail_with(None);
    assert!(session.submit().await.is_ok());
}

#[tokio::test]
async fn test_open_hydrates_and_refetches_tariff() {
    let stored = StoredOrder {
        id: OrderId(31),
        customer_id: PARISH,
        customer_name: "Paróquia São José".to_string(),
        discount_percent: dec!(10),
        freight_value: Money::from_cents(1300),
        grand_total: Money::ZERO,
        note: "Festa do padroeiro".to_string(),
        order_date: None,
        cancelled: false,
        items: vec![
            StoredOrderItem {
                product_id: ProductId(11),
                product_name: "Vela de sete dias".to_string(),
                unit_price: PriceValue::Text("R$ 12,00".to_string()),
                quantity: dec!(6),
                weight: dec!(400),
            },
            StoredOrderItem {
                product_id: ProductId(20),
                product_name: "Terço de madeira".to_string(),
                unit_price: PriceValue::Amount(Money::from_cents(1500)),
                quantity: dec!(2),
                weight: dec!(50),
            },
        ],
    };
    let fixture = fixture_with(
        InMemoryTariffLookup::new().with_tariff(PARISH, threshold_tariff()),
        InMemoryOrderStore::new().with_order(stored),
    );

    let mut session = OrderSession::open(fixture.collaborators.clone(), EngineConfig::default(), OrderId(31))
        .await
        .unwrap();

    let totals = session.totals();
    assert_eq!(totals.subtotal, Money::from_cents(7200 + 3000));
    assert_eq!(totals.total_weight, dec!(2500));
    assert_eq!(totals.freight, Money::from_cents(1300));
    assert_eq!(totals.grand_total, Money::from_cents(10200 - 1020 + 1300));
    assert_eq!(session.tariff_status(), &TariffStatus::Loaded);
    assert_eq!(session.draft().note(), "Festa do padroeiro");
    assert!(session.draft().order_date().is_none());
    assert!(!session.draft().is_cancelled());

    // edit mode keeps the persisted discount and updates the same order
    session.change_customer(&chapel()).await.unwrap();
    assert_eq!(session.draft().discount_percent(), dec!(10));
    assert_eq!(session.submit().await, Ok(OrderId(31)));
    assert!(matches!(fixture.orders.submissions()[0], Submission::Update(OrderId(31), _)));
}

#[tokio::test]
async fn test_open_with_failed_tariff_lookup() {
    let stored = StoredOrder {
        id: OrderId(5),
        customer_id: PARISH,
        customer_name: String::new(),
        discount_percent: Decimal::ZERO,
        freight_value: Money::ZERO,
        grand_total: Money::ZERO,
        note: String::new(),
        order_date: None,
        cancelled: false,
        items: vec![StoredOrderItem {
            product_id: ProductId(10),
            product_name: "Vela votiva".to_string(),
            unit_price: PriceValue::Amount(Money::from_cents(250)),
            quantity: dec!(1),
            weight: dec!(120),
        }],
    };
    let fixture = fixture_with(InMemoryTariffLookup::new(), InMemoryOrderStore::new().with_order(stored));
    fixture.tariffs.fail_with(Some("timeout"));

    let session = OrderSession::open(fixture.collaborators.clone(), EngineConfig::default(), OrderId(5))
        .await
        .unwrap();
    assert_eq!(session.tariff_status(), &TariffStatus::Failed("Lookup service unavailable: timeout".to_string()));
    assert_eq!(session.totals().grand_total, Money::from_cents(250));

    let missing = OrderSession::open(fixture.collaborators.clone(), EngineConfig::default(), OrderId(6)).await;
    assert!(matches!(missing, Err(SessionError::Storage(StorageError::NotFound(OrderId(6))))));
}

#[tokio::test]
async fn test_export_pdf_requires_saved_order() {
    let fixture = fixture();
    let mut session = session(&fixture);
    assert_eq!(session.export_pdf().await, Err(SessionError::NotSaved));

    session.change_customer(&parish()).await.unwrap();
    session.add_product(&product(10, "Vela votiva", 250, dec!(120))).unwrap();
    let order_id = session.submit().await.unwrap();

    let pdf = session.export_pdf().await.unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    assert!(String::from_utf8_lossy(&pdf).contains(&format!("order {order_id}")));

    fixture.documents.fail_with(Some("renderer down"));
    assert!(matches!(session.export_pdf().await, Err(SessionError::Export(_))));
}

#[tokio::test]
async fn test_product_search_is_throttled_and_filtered() {
    let fixture = fixture();
    let mut session = session(&fixture);
    let start = Instant::now();

    session.type_product_query("ve", start);
    assert_eq!(session.search_products(start + Duration::from_millis(400)).await, Ok(None));

    session.type_product_query("vela", start + Duration::from_millis(500));
    assert_eq!(session.search_products(start + Duration::from_millis(600)).await, Ok(None));

    let found = session
        .search_products(start + Duration::from_millis(800))
        .await
        .unwrap()
        .unwrap();
    let ids: Vec<_> = found.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![ProductId(10), ProductId(11)]);

    // same settled text again
    session.type_product_query("vela", start + Duration::from_millis(900));
    assert_eq!(session.search_products(start + Duration::from_millis(1300)).await, Ok(None));
}

#[tokio::test]
async fn test_customer_search() {
    let fixture = fixture();
    let mut session = session(&fixture);
    let start = Instant::now();

    session.type_customer_query("Cap", start);
    let found = session
        .search_customers(start + Duration::from_millis(300))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, vec![chapel()]);
}

#[tokio::test]
async fn test_display_totals_use_configured_currency() {
    let fixture = fixture();
    let mut session = session(&fixture);
    session.add_product(&product(1, "Sino", 123456, dec!(0))).unwrap();

    let display = session.display_totals();
    assert_eq!(display.subtotal, "R$\u{a0}1.234,56");
    assert_eq!(display.freight, "R$\u{a0}0,00");
    assert_eq!(display.grand_total, "R$\u{a0}1.234,56");
}
