use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::collaborators::{
    Customer, CustomerDirectory, DocumentExporter, FreightTariffLookup, LookupError, OrderStore,
    Product, ProductCatalog,
};
use crate::config::EngineConfig;
use crate::freight::FreightTariff;
use crate::money::Money;
use crate::orders::{
    CustomerId, CustomerRef, DisplayTotals, DraftState, OrderDraft, OrderId, ProductId,
    SessionError, SessionResult, Totals,
};
use crate::search::SearchThrottle;

/// External services an order session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub customers: Arc<dyn CustomerDirectory>,
    pub tariffs: Arc<dyn FreightTariffLookup>,
    pub products: Arc<dyn ProductCatalog>,
    pub orders: Arc<dyn OrderStore>,
    pub documents: Arc<dyn DocumentExporter>,
}

/// Where the current customer's tariff stands, for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TariffStatus {
    /// No customer selected yet
    NotRequested,
    Pending,
    Loaded,
    /// The customer has no tariff; freight is zero
    Unavailable,
    /// Lookup failed; freight is zero until a retry succeeds
    Failed(String),
}

/// A tariff lookup issued for one customer selection
///
/// Resolving it does not touch the session, so the caller is free to keep
/// editing while it is in flight.
pub struct TariffRequest {
    customer_id: CustomerId,
    generation: u64,
    lookup: Arc<dyn FreightTariffLookup>,
}

impl TariffRequest {
    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn resolve(self) -> ResolvedTariff {
        let outcome = self.lookup.tariff_for(self.customer_id).await;
        ResolvedTariff {
            customer_id: self.customer_id,
            generation: self.generation,
            outcome,
        }
    }
}

impl fmt::Debug for TariffRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TariffRequest")
            .field("customer_id", &self.customer_id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Outcome of a [`TariffRequest`], ready to be merged into the session
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTariff {
    pub customer_id: CustomerId,
    pub generation: u64,
    pub outcome: Result<Option<FreightTariff>, LookupError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TariffApplication {
    /// Merged into the current draft
    Applied(Totals),
    /// A newer customer selection was made after the request; nothing changed
    Superseded,
}

/// Orchestrates one order draft against the external collaborators
///
/// A session owns its draft exclusively; every mutation returns the
/// recomputed totals.
pub struct OrderSession {
    draft: OrderDraft,
    collaborators: Collaborators,
    config: EngineConfig,
    tariff_generation: u64,
    tariff_status: TariffStatus,
    customer_search: SearchThrottle,
    product_search: SearchThrottle,
}

impl OrderSession {
    /// Session for a new order
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        let customer_search = SearchThrottle::new(config.search_debounce, config.search_min_chars);
        let product_search = customer_search.clone();
        Self {
            draft: OrderDraft::new(),
            collaborators,
            config,
            tariff_generation: 0,
            tariff_status: TariffStatus::NotRequested,
            customer_search,
            product_search,
        }
    }

    /// Session editing a persisted order
    ///
    /// The customer's tariff is fetched again. A failed fetch leaves the
    /// session usable with zero freight and a `Failed` tariff status.
    pub async fn open(
        collaborators: Collaborators,
        config: EngineConfig,
        order_id: OrderId,
    ) -> SessionResult<Self> {
        let stored = collaborators.orders.fetch(order_id).await?;
        let mut session = Self::new(collaborators, config);
        session.draft = OrderDraft::hydrate(&stored)?;
        info!(
            order_id = %order_id,
            items = stored.items.len(),
            order_date = ?session.draft.order_date(),
            cancelled = session.draft.is_cancelled(),
            "Order opened for editing"
        );

        if let Err(err) = session.refresh_tariff().await {
            warn!(order_id = %order_id, error = %err, "Tariff refetch failed, freight left at zero");
        }
        Ok(session)
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn totals(&self) -> Totals {
        self.draft.totals()
    }

    pub fn tariff_status(&self) -> &TariffStatus {
        &self.tariff_status
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current totals formatted with the configured currency
    pub fn display_totals(&self) -> DisplayTotals {
        let totals = self.draft.totals();
        let currency = &self.config.currency;
        DisplayTotals {
            subtotal: totals.subtotal.format_with(currency),
            discount_amount: totals.discount_amount.format_with(currency),
            freight: totals.freight.format_with(currency),
            grand_total: totals.grand_total.format_with(currency),
        }
    }

    /// Select `customer` and issue the lookup for their tariff
    ///
    /// On a new order the customer's default discount, if any, becomes the
    /// draft's discount.
    pub fn select_customer(&mut self, customer: &Customer) -> SessionResult<TariffRequest> {
        if let Err(errors) = customer.validate() {
            warn!(customer_id = %customer.id, errors = %errors, "Customer record failed validation");
        }

        self.draft.set_customer(CustomerRef {
            id: customer.id,
            name: customer.name.clone(),
        })?;

        if !self.draft.is_persisted() {
            if let Some(discount) = customer.discount_percent {
                if let Err(err) = self.draft.set_discount(discount) {
                    warn!(customer_id = %customer.id, error = %err, "Ignoring customer default discount");
                }
            }
        }

        info!(customer_id = %customer.id, "Customer selected");
        Ok(self.issue_tariff_request(customer.id))
    }

    /// Issue a fresh lookup for the current customer's tariff
    pub fn request_tariff(&mut self) -> Option<TariffRequest> {
        let customer_id = self.draft.customer()?.id;
        Some(self.issue_tariff_request(customer_id))
    }

    /// Merge a resolved lookup into the current draft
    ///
    /// Freight is priced against the items present now, not those present
    /// when the request was issued. A response to anything but the latest
    /// request is dropped.
    pub fn apply_tariff(&mut self, resolved: ResolvedTariff) -> SessionResult<TariffApplication> {
        let current_customer = self.draft.customer().map(|c| c.id);
        if resolved.generation != self.tariff_generation || current_customer != Some(resolved.customer_id) {
            warn!(
                customer_id = %resolved.customer_id,
                generation = resolved.generation,
                current = self.tariff_generation,
                "Superseded tariff response dropped"
            );
            return Ok(TariffApplication::Superseded);
        }

        match resolved.outcome {
            Ok(Some(tariff)) => {
                if let Err(errors) = tariff.validate() {
                    warn!(customer_id = %resolved.customer_id, errors = %errors, "Tariff failed validation, pricing it anyway");
                }
                let totals = match self.draft.set_tariff(tariff) {
                    Ok(totals) => totals,
                    Err(err) => {
                        self.tariff_status = TariffStatus::Failed(err.to_string());
                        warn!(customer_id = %resolved.customer_id, error = %err, "Tariff could not be priced");
                        return Err(err.into());
                    }
                };
                self.tariff_status = TariffStatus::Loaded;
                info!(customer_id = %resolved.customer_id, freight = %totals.freight.amount(), "Tariff applied");
                Ok(TariffApplication::Applied(totals))
            }
            Ok(None) => {
                let totals = self.draft.clear_tariff()?;
                self.tariff_status = TariffStatus::Unavailable;
                info!(customer_id = %resolved.customer_id, "Customer has no tariff");
                Ok(TariffApplication::Applied(totals))
            }
            Err(err) => {
                self.draft.clear_tariff()?;
                self.tariff_status = TariffStatus::Failed(err.to_string());
                warn!(customer_id = %resolved.customer_id, error = %err, "Tariff lookup failed");
                Err(err.into())
            }
        }
    }

    /// Select a customer and wait for their tariff
    pub async fn change_customer(&mut self, customer: &Customer) -> SessionResult<Totals> {
        let request = self.select_customer(customer)?;
        let resolved = request.resolve().await;
        self.apply_tariff(resolved)?;
        Ok(self.totals())
    }

    /// Look a customer up by id, then select them
    pub async fn select_customer_by_id(&mut self, customer_id: CustomerId) -> SessionResult<Totals> {
        let customer = self.collaborators.customers.find_customer(customer_id).await?;
        self.change_customer(&customer).await
    }

    /// Fetch the current customer's tariff again, e.g. after a failed lookup
    pub async fn refresh_tariff(&mut self) -> SessionResult<Totals> {
        let Some(request) = self.request_tariff() else {
            return Ok(self.totals());
        };
        let resolved = request.resolve().await;
        self.apply_tariff(resolved)?;
        Ok(self.totals())
    }

    pub fn add_product(&mut self, product: &Product) -> SessionResult<Totals> {
        Ok(self.draft.add_product(product)?)
    }

    pub fn set_quantity(&mut self, index: usize, quantity: Decimal) -> SessionResult<Totals> {
        Ok(self.draft.set_quantity(index, quantity)?)
    }

    pub fn set_unit_price(&mut self, index: usize, unit_price: Money) -> SessionResult<Totals> {
        Ok(self.draft.set_unit_price(index, unit_price)?)
    }

    pub fn set_unit_price_text(&mut self, index: usize, text: &str) -> SessionResult<Totals> {
        Ok(self.draft.set_unit_price_text(index, text)?)
    }

    pub fn remove_at(&mut self, index: usize) -> SessionResult<Totals> {
        Ok(self.draft.remove_at(index)?)
    }

    pub fn remove_product(&mut self, product_id: ProductId) -> SessionResult<Totals> {
        Ok(self.draft.remove_product(product_id)?)
    }

    pub fn set_discount(&mut self, discount_percent: Decimal) -> SessionResult<Totals> {
        Ok(self.draft.set_discount(discount_percent)?)
    }

    pub fn set_note(&mut self, note: impl Into<String>) {
        self.draft.set_note(note);
    }

    /// Validate and persist the draft
    ///
    /// Creates the order on first save, updates it afterwards. Validation
    /// failures leave the draft untouched; storage failures leave it editable
    /// and unsaved so the caller can retry.
    pub async fn submit(&mut self) -> SessionResult<OrderId> {
        let payload = match self.draft.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "Order submission rejected");
                return Err(err.into());
            }
        };

        self.draft.transition(DraftState::Saving)?;
        let result = match self.draft.order_id() {
            Some(order_id) => self
                .collaborators
                .orders
                .update(order_id, &payload)
                .await
                .map(|()| order_id),
            None => self.collaborators.orders.create(&payload).await,
        };

        match result {
            Ok(order_id) => {
                self.draft.mark_saved(order_id)?;
                info!(
                    order_id = %order_id,
                    customer_id = %payload.customer_id,
                    grand_total = %payload.grand_total.amount(),
                    "Order saved"
                );
                Ok(order_id)
            }
            Err(err) => {
                self.draft.transition(DraftState::Editing)?;
                warn!(error = %err, "Order storage failed, draft kept for retry");
                Err(err.into())
            }
        }
    }

    /// PDF for the saved order, passed through untouched
    pub async fn export_pdf(&self) -> SessionResult<Vec<u8>> {
        let order_id = self.draft.order_id().ok_or(SessionError::NotSaved)?;
        Ok(self.collaborators.documents.generate_pdf(order_id).await?)
    }

    pub fn type_customer_query(&mut self, text: &str, now: Instant) {
        self.customer_search.keystroke(text, now);
    }

    /// Run the customer search if typing has settled
    ///
    /// `Ok(None)` means nothing was dispatched or the response was superseded.
    pub async fn search_customers(&mut self, now: Instant) -> SessionResult<Option<Vec<Customer>>> {
        let Some(dispatch) = self.customer_search.poll(now) else {
            return Ok(None);
        };
        let customers = self
            .collaborators
            .customers
            .search_customers(&dispatch.query)
            .await?;

        if !self.customer_search.accept(dispatch.seq) {
            return Ok(None);
        }
        debug!(query = %dispatch.query, results = customers.len(), "Customer search completed");
        Ok(Some(customers))
    }

    pub fn type_product_query(&mut self, text: &str, now: Instant) {
        self.product_search.keystroke(text, now);
    }

    /// Run the product search if typing has settled; inactive products are dropped
    pub async fn search_products(&mut self, now: Instant) -> SessionResult<Option<Vec<Product>>> {
        let Some(dispatch) = self.product_search.poll(now) else {
            return Ok(None);
        };
        let products = self
            .collaborators
            .products
            .search_products(&dispatch.query)
            .await?;

        if !self.product_search.accept(dispatch.seq) {
            return Ok(None);
        }
        let active: Vec<Product> = products.into_iter().filter(|p| p.active).collect();
        debug!(query = %dispatch.query, results = active.len(), "Product search completed");
        Ok(Some(active))
    }

    fn issue_tariff_request(&mut self, customer_id: CustomerId) -> TariffRequest {
        self.tariff_generation += 1;
        self.tariff_status = TariffStatus::Pending;
        debug!(customer_id = %customer_id, generation = self.tariff_generation, "Tariff lookup issued");
        TariffRequest {
            customer_id,
            generation: self.tariff_generation,
            lookup: Arc::clone(&self.collaborators.tariffs),
        }
    }
}
