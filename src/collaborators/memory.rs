// In-memory collaborators
//
// Intended for tests/dev. Each one can be told to fail so sessions can be
// driven through lookup and storage errors.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Notify;

use crate::collaborators::{
    Customer, CustomerDirectory, DocumentExporter, ExportError, FreightTariffLookup, LookupError,
    OrderStore, Product, ProductCatalog, StorageError,
};
use crate::freight::FreightTariff;
use crate::orders::{CustomerId, OrderId, OrderPayload, PriceValue, StoredOrder, StoredOrderItem};

fn matches_prefix(name: &str, prefix: &str) -> bool {
    name.to_lowercase().starts_with(&prefix.to_lowercase())
}

fn scripted_failure(failure: &RwLock<Option<String>>) -> Option<String> {
    match failure.read() {
        Ok(guard) => guard.clone(),
        Err(_) => Some("lock poisoned".to_string()),
    }
}

fn set_scripted_failure(failure: &RwLock<Option<String>>, reason: Option<&str>) {
    if let Ok(mut guard) = failure.write() {
        *guard = reason.map(str::to_string);
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCustomerDirectory {
    customers: RwLock<Vec<Customer>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryCustomerDirectory {
    pub fn new(customers: Vec<Customer>) -> Self {
        Self {
            customers: RwLock::new(customers),
            failure: RwLock::new(None),
        }
    }

    /// Make every call fail with `reason`, or succeed again with `None`
    pub fn fail_with(&self, reason: Option<&str>) {
        set_scripted_failure(&self.failure, reason);
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn find_customer(&self, id: CustomerId) -> Result<Customer, LookupError> {
        if let Some(reason) = scripted_failure(&self.failure) {
            return Err(LookupError::Unavailable(reason));
        }
        let customers = self
            .customers
            .read()
            .map_err(|_| LookupError::Unavailable("lock poisoned".to_string()))?;
        customers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(LookupError::CustomerNotFound(id))
    }

    async fn search_customers(&self, prefix: &str) -> Result<Vec<Customer>, LookupError> {
        if let Some(reason) = scripted_failure(&self.failure) {
            return Err(LookupError::Unavailable(reason));
        }
        let customers = self
            .customers
            .read()
            .map_err(|_| LookupError::Unavailable("lock poisoned".to_string()))?;
        Ok(customers
            .iter()
            .filter(|c| matches_prefix(&c.name, prefix))
            .cloned()
            .collect())
    }
}

/// Tariff lookup keyed by customer
///
/// With a gate installed, every lookup parks until the gate is notified, which
/// lets a test interleave edits with an in-flight lookup.
#[derive(Debug, Default)]
pub struct InMemoryTariffLookup {
    tariffs: RwLock<HashMap<CustomerId, FreightTariff>>,
    failure: RwLock<Option<String>>,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl InMemoryTariffLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tariff(self, customer_id: CustomerId, tariff: FreightTariff) -> Self {
        self.set_tariff(customer_id, tariff);
        self
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_tariff(&self, customer_id: CustomerId, tariff: FreightTariff) {
        if let Ok(mut tariffs) = self.tariffs.write() {
            tariffs.insert(customer_id, tariff);
        }
    }

    pub fn fail_with(&self, reason: Option<&str>) {
        set_scripted_failure(&self.failure, reason);
    }

    /// Number of lookups served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FreightTariffLookup for InMemoryTariffLookup {
    async fn tariff_for(&self, customer_id: CustomerId) -> Result<Option<FreightTariff>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(reason) = scripted_failure(&self.failure) {
            return Err(LookupError::Unavailable(reason));
        }
        let tariffs = self
            .tariffs
            .read()
            .map_err(|_| LookupError::Unavailable("lock poisoned".to_string()))?;
        Ok(tariffs.get(&customer_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<Vec<Product>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryProductCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: RwLock::new(products),
            failure: RwLock::new(None),
        }
    }

    pub fn fail_with(&self, reason: Option<&str>) {
        set_scripted_failure(&self.failure, reason);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn search_products(&self, prefix: &str) -> Result<Vec<Product>, LookupError> {
        if let Some(reason) = scripted_failure(&self.failure) {
            return Err(LookupError::Unavailable(reason));
        }
        let products = self
            .products
            .read()
            .map_err(|_| LookupError::Unavailable("lock poisoned".to_string()))?;
        Ok(products
            .iter()
            .filter(|p| matches_prefix(&p.name, prefix))
            .cloned()
            .collect())
    }
}

/// A call received by [`InMemoryOrderStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Create(OrderPayload),
    Update(OrderId, OrderPayload),
}

#[derive(Debug)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, StoredOrder>>,
    submissions: RwLock<Vec<Submission>>,
    failure: RwLock<Option<String>>,
    next_id: AtomicI64,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            submissions: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a persisted order
    pub fn with_order(self, order: StoredOrder) -> Self {
        if let Ok(mut orders) = self.orders.write() {
            self.next_id.fetch_max(order.id.0 + 1, Ordering::SeqCst);
            orders.insert(order.id, order);
        }
        self
    }

    /// Reject every create/update with `reason`, or accept again with `None`
    pub fn fail_with(&self, reason: Option<&str>) {
        set_scripted_failure(&self.failure, reason);
    }

    /// Every create/update accepted so far, oldest first
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .read()
            .map(|submissions| submissions.clone())
            .unwrap_or_default()
    }

    fn record(&self, submission: Submission) -> Result<(), StorageError> {
        self.submissions
            .write()
            .map_err(|_| StorageError::Unreachable("lock poisoned".to_string()))?
            .push(submission);
        Ok(())
    }

    fn stored_from_payload(id: OrderId, payload: &OrderPayload, previous: Option<&StoredOrder>) -> StoredOrder {
        let name_of = |product_id| {
            previous
                .and_then(|order| order.items.iter().find(|item| item.product_id == product_id))
                .map(|item| item.product_name.clone())
                .unwrap_or_default()
        };

        StoredOrder {
            id,
            customer_id: payload.customer_id,
            customer_name: previous
                .filter(|order| order.customer_id == payload.customer_id)
                .map(|order| order.customer_name.clone())
                .unwrap_or_default(),
            discount_percent: payload.discount_percent,
            freight_value: payload.freight_value,
            grand_total: payload.grand_total,
            note: payload.note.clone(),
            order_date: previous.and_then(|order| order.order_date).or_else(|| Some(chrono::Utc::now())),
            cancelled: false,
            items: payload
                .items
                .iter()
                .map(|item| StoredOrderItem {
                    product_id: item.product_id,
                    product_name: name_of(item.product_id),
                    unit_price: PriceValue::Amount(item.unit_price),
                    quantity: item.quantity,
                    weight: item.weight,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, payload: &OrderPayload) -> Result<OrderId, StorageError> {
        if let Some(reason) = scripted_failure(&self.failure) {
            return Err(StorageError::Unreachable(reason));
        }
        let id = OrderId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.orders
            .write()
            .map_err(|_| StorageError::Unreachable("lock poisoned".to_string()))?
            .insert(id, Self::stored_from_payload(id, payload, None));
        self.record(Submission::Create(payload.clone()))?;
        Ok(id)
    }

    async fn update(&self, id: OrderId, payload: &OrderPayload) -> Result<(), StorageError> {
        if let Some(reason) = scripted_failure(&self.failure) {
            return Err(StorageError::Unreachable(reason));
        }
        {
            let mut orders = self
                .orders
                .write()
                .map_err(|_| StorageError::Unreachable("lock poisoned".to_string()))?;
            let previous = orders.get(&id).ok_or(StorageError::NotFound(id))?;
            let updated = Self::stored_from_payload(id, payload, Some(previous));
            orders.insert(id, updated);
        }
        self.record(Submission::Update(id, payload.clone()))
    }

    async fn fetch(&self, id: OrderId) -> Result<StoredOrder, StorageError> {
        let orders = self
            .orders
            .read()
            .map_err(|_| StorageError::Unreachable("lock poisoned".to_string()))?;
        orders.get(&id).cloned().ok_or(StorageError::NotFound(id))
    }
}

/// Exporter that renders a placeholder document naming the order
#[derive(Debug, Default)]
pub struct InMemoryDocumentExporter {
    failure: RwLock<Option<String>>,
}

impl InMemoryDocumentExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, reason: Option<&str>) {
        set_scripted_failure(&self.failure, reason);
    }
}

#[async_trait]
impl DocumentExporter for InMemoryDocumentExporter {
    async fn generate_pdf(&self, order_id: OrderId) -> Result<Vec<u8>, ExportError> {
        if let Some(reason) = scripted_failure(&self.failure) {
            return Err(ExportError::Failed(reason));
        }
        Ok(format!("%PDF-1.4\n% order {order_id}\n").into_bytes())
    }
}
