// order-quote: price a quote file end to end
//
// Usage: order-quote <quote.json>
//
// The quote names a customer, their tariff, the products and quantities. It is
// run through an order session backed by in-memory services and the priced
// breakdown plus the storage payload are printed.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use order_pricing::collaborators::memory::{
    InMemoryCustomerDirectory, InMemoryDocumentExporter, InMemoryOrderStore,
    InMemoryProductCatalog, InMemoryTariffLookup,
};
use order_pricing::collaborators::{Customer, Product};
use order_pricing::orders::Collaborators;
use order_pricing::{telemetry, EngineConfig, FreightTariff, OrderSession};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Quote {
    customer: Customer,
    #[serde(default)]
    tariff: Option<FreightTariff>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    discount_percent: Option<Decimal>,
    #[serde(default)]
    note: String,
    items: Vec<QuoteItem>,
}

#[derive(Debug, Deserialize)]
struct QuoteItem {
    product: Product,
    #[serde(with = "rust_decimal::serde::float")]
    quantity: Decimal,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();
    let config = EngineConfig::from_env()?;

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: order-quote <quote.json>")?;
    let quote: Quote = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    tracing::info!("Pricing quote {} ({} items)", path, quote.items.len());

    let mut tariffs = InMemoryTariffLookup::new();
    if let Some(tariff) = quote.tariff.clone() {
        tariffs = tariffs.with_tariff(quote.customer.id, tariff);
    }
    let collaborators = Collaborators {
        customers: Arc::new(InMemoryCustomerDirectory::new(vec![quote.customer.clone()])),
        tariffs: Arc::new(tariffs),
        products: Arc::new(InMemoryProductCatalog::new(
            quote.items.iter().map(|item| item.product.clone()).collect(),
        )),
        orders: Arc::new(InMemoryOrderStore::new()),
        documents: Arc::new(InMemoryDocumentExporter::new()),
    };

    let mut session = OrderSession::new(collaborators, config);
    session.change_customer(&quote.customer).await?;

    // Items are added in quote order; the draft lists the latest first
    for item in &quote.items {
        session.add_product(&item.product)?;
        let index = session
            .draft()
            .items()
            .iter()
            .position(|line| line.product_id == item.product.id)
            .ok_or("product missing after add")?;
        session.set_quantity(index, item.quantity)?;
    }
    if let Some(discount) = quote.discount_percent {
        session.set_discount(discount)?;
    }
    session.set_note(quote.note.clone());

    let currency = &session.config().currency;
    for line in session.draft().items() {
        println!(
            "{:>8} × {:<32} {:>16}",
            line.quantity,
            line.product_name,
            line.line_total().format_with(currency)
        );
    }

    let display = session.display_totals();
    println!("{:<43} {:>16}", "Subtotal", display.subtotal);
    if !session.totals().discount_amount.is_zero() {
        println!("{:<43} {:>16}", "Desconto", display.discount_amount);
    }
    println!("{:<43} {:>16}", "Frete", display.freight);
    println!("{:<43} {:>16}", "Total", display.grand_total);

    let payload = session.draft().to_payload()?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
