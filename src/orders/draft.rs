// Order draft
//
// The mutable order being edited. Every mutation goes through a method that
// rebuilds the derived figures from the current inputs and returns them. An
// edit whose figures cannot be computed is rejected and leaves the draft as it
// was.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::freight::FreightTariff;
use crate::money::Money;
use crate::orders::{
    CustomerRef, DraftError, DraftState, DraftStateMachine, LineItem, OrderId, OrderPayload,
    OrderPayloadItem, PriceCalculator, ProductId, StoredOrder, Totals,
};
use crate::collaborators::Product;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    order_id: Option<OrderId>,
    customer: Option<CustomerRef>,
    /// Most recently added first
    items: Vec<LineItem>,
    discount_percent: Decimal,
    tariff: Option<FreightTariff>,
    note: String,
    order_date: Option<DateTime<Utc>>,
    cancelled: bool,
    state: DraftState,
    totals: Totals,
}

impl Default for OrderDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderDraft {
    /// Empty draft for a new order
    pub fn new() -> Self {
        Self {
            order_id: None,
            customer: None,
            items: Vec::new(),
            discount_percent: Decimal::ZERO,
            tariff: None,
            note: String::new(),
            order_date: None,
            cancelled: false,
            state: DraftState::Empty,
            totals: Totals::default(),
        }
    }

    /// Draft for editing a persisted order
    ///
    /// The tariff is not part of a stored order; freight stays zero until the
    /// customer's tariff has been fetched again.
    pub fn hydrate(stored: &StoredOrder) -> Result<Self, DraftError> {
        let mut draft = Self {
            order_id: Some(stored.id),
            customer: Some(CustomerRef {
                id: stored.customer_id,
                name: stored.customer_name.clone(),
            }),
            items: stored
                .items
                .iter()
                .map(LineItem::try_from)
                .collect::<Result<_, _>>()?,
            discount_percent: stored.discount_percent,
            note: stored.note.clone(),
            order_date: stored.order_date,
            cancelled: stored.cancelled,
            state: DraftState::Editing,
            ..Self::new()
        };
        draft.recompute()?;
        Ok(draft)
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Whether submission updates an existing order rather than creating one
    pub fn is_persisted(&self) -> bool {
        self.order_id.is_some()
    }

    pub fn customer(&self) -> Option<&CustomerRef> {
        self.customer.as_ref()
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn discount_percent(&self) -> Decimal {
        self.discount_percent
    }

    pub fn tariff(&self) -> Option<&FreightTariff> {
        self.tariff.as_ref()
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn order_date(&self) -> Option<DateTime<Utc>> {
        self.order_date
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn freight_value(&self) -> Money {
        self.totals.freight
    }

    pub fn grand_total(&self) -> Money {
        self.totals.grand_total
    }

    /// Select the customer
    ///
    /// Choosing a different customer drops the previous customer's tariff;
    /// re-selecting the same customer keeps it.
    pub fn set_customer(&mut self, customer: CustomerRef) -> Result<Totals, DraftError> {
        self.edit(|draft| {
            let changed = draft.customer.as_ref().map(|c| c.id) != Some(customer.id);
            if changed {
                draft.tariff = None;
            }
            draft.customer = Some(customer);
            draft.mark_edited(true);
            Ok(())
        })
    }

    /// Install the tariff for the current customer and reprice freight
    pub fn set_tariff(&mut self, tariff: FreightTariff) -> Result<Totals, DraftError> {
        self.edit(|draft| {
            draft.tariff = Some(tariff);
            Ok(())
        })
    }

    pub fn clear_tariff(&mut self) -> Result<Totals, DraftError> {
        self.edit(|draft| {
            draft.tariff = None;
            Ok(())
        })
    }

    /// Add one unit of `product`
    ///
    /// A product already in the draft gets its quantity incremented instead of
    /// a second row.
    pub fn add_product(&mut self, product: &Product) -> Result<Totals, DraftError> {
        if !product.active {
            return Err(DraftError::InactiveProduct(product.id));
        }

        self.edit(|draft| {
            match draft.items.iter().position(|item| item.product_id == product.id) {
                Some(index) => {
                    let item = &mut draft.items[index];
                    item.quantity = item
                        .quantity
                        .checked_add(Decimal::ONE)
                        .ok_or(DraftError::AmountOverflow)?;
                }
                None => draft.items.insert(
                    0,
                    LineItem::new(
                        product.id,
                        product.name.clone(),
                        product.unit_price,
                        Decimal::ONE,
                        product.unit_weight,
                    )?,
                ),
            }
            draft.mark_edited(true);
            Ok(())
        })
    }

    /// Zero is accepted while editing; submission rejects it
    pub fn set_quantity(&mut self, index: usize, quantity: Decimal) -> Result<Totals, DraftError> {
        if quantity < Decimal::ZERO {
            return Err(DraftError::NegativeQuantity(quantity));
        }
        self.edit(|draft| {
            draft.item_mut(index)?.quantity = quantity;
            draft.mark_edited(false);
            Ok(())
        })
    }

    pub fn set_unit_price(&mut self, index: usize, unit_price: Money) -> Result<Totals, DraftError> {
        self.edit(|draft| {
            draft.item_mut(index)?.unit_price = unit_price.max(Money::ZERO);
            draft.mark_edited(false);
            Ok(())
        })
    }

    /// Set a unit price from raw price-field text (see [`Money::parse`])
    pub fn set_unit_price_text(&mut self, index: usize, text: &str) -> Result<Totals, DraftError> {
        self.set_unit_price(index, Money::parse(text))
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Totals, DraftError> {
        if index >= self.items.len() {
            return Err(DraftError::ItemIndexOutOfRange(index));
        }
        self.edit(|draft| {
            draft.items.remove(index);
            draft.mark_edited(false);
            Ok(())
        })
    }

    pub fn remove_product(&mut self, product_id: ProductId) -> Result<Totals, DraftError> {
        let index = self
            .items
            .iter()
            .position(|item| item.product_id == product_id)
            .ok_or(DraftError::ProductNotInOrder(product_id))?;
        self.remove_at(index)
    }

    /// Change the discount percentage; only the grand total moves
    pub fn set_discount(&mut self, discount_percent: Decimal) -> Result<Totals, DraftError> {
        if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
            return Err(DraftError::InvalidDiscount(discount_percent));
        }

        let discount_amount = PriceCalculator::discount_amount(self.totals.subtotal, discount_percent)
            .ok_or(DraftError::AmountOverflow)?;
        let grand_total =
            PriceCalculator::grand_total(&self.items, discount_percent, self.totals.freight)
                .ok_or(DraftError::AmountOverflow)?;

        self.discount_percent = discount_percent;
        self.mark_edited(false);
        self.totals.discount_amount = discount_amount;
        self.totals.grand_total = grand_total;
        Ok(self.totals)
    }

    pub fn set_note(&mut self, note: impl Into<String>) {
        self.note = note.into();
        self.mark_edited(false);
    }

    /// Rebuild line totals, weight, freight and grand total from current inputs
    pub fn recompute(&mut self) -> Result<Totals, DraftError> {
        let totals = PriceCalculator::totals(&self.items, self.discount_percent, self.tariff.as_ref())
            .ok_or(DraftError::AmountOverflow)?;
        for item in &mut self.items {
            item.refresh_total()?;
        }
        self.totals = totals;
        debug!(
            items = self.items.len(),
            total_weight = %self.totals.total_weight,
            freight = %self.totals.freight.amount(),
            grand_total = %self.totals.grand_total.amount(),
            "Order draft recomputed"
        );
        Ok(self.totals)
    }

    /// Check the draft can be handed to order storage
    pub fn validate_for_submission(&self) -> Result<(), DraftError> {
        if self.customer.is_none() {
            return Err(DraftError::MissingCustomer);
        }
        if self.items.is_empty() {
            return Err(DraftError::EmptyOrder);
        }
        if let Some(item) = self.items.iter().find(|item| item.quantity <= Decimal::ZERO) {
            return Err(DraftError::NonPositiveQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }
        Ok(())
    }

    /// Snapshot of the draft in the shape order storage expects
    pub fn to_payload(&self) -> Result<OrderPayload, DraftError> {
        self.validate_for_submission()?;
        let customer = self.customer.as_ref().ok_or(DraftError::MissingCustomer)?;

        Ok(OrderPayload {
            customer_id: customer.id,
            discount_percent: self.discount_percent,
            freight_value: self.totals.freight,
            grand_total: self.totals.grand_total,
            note: self.note.clone(),
            items: self
                .items
                .iter()
                .map(|item| OrderPayloadItem {
                    product_id: item.product_id,
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    discount: Decimal::ZERO,
                    weight: Decimal::ZERO,
                })
                .collect(),
        })
    }

    pub(crate) fn transition(&mut self, to: DraftState) -> Result<(), DraftError> {
        self.state = DraftStateMachine::transition(self.state, to).map_err(DraftError::InvalidTransition)?;
        Ok(())
    }

    pub(crate) fn mark_saved(&mut self, order_id: OrderId) -> Result<(), DraftError> {
        self.transition(DraftState::Saved)?;
        self.order_id = Some(order_id);
        Ok(())
    }

    /// Apply `change` to a copy and keep it only if its totals compute
    fn edit<F>(&mut self, change: F) -> Result<Totals, DraftError>
    where
        F: FnOnce(&mut OrderDraft) -> Result<(), DraftError>,
    {
        let mut next = self.clone();
        change(&mut next)?;
        let totals = next.recompute()?;
        *self = next;
        Ok(totals)
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut LineItem, DraftError> {
        self.items
            .get_mut(index)
            .ok_or(DraftError::ItemIndexOutOfRange(index))
    }

    /// Empty drafts only start editing on customer selection or item add;
    /// saved drafts go back to editing on any change
    fn mark_edited(&mut self, starts_editing: bool) {
        let reopen = match self.state {
            DraftState::Empty => starts_editing,
            DraftState::Saved => true,
            DraftState::Editing | DraftState::Saving => false,
        };
        if reopen {
            self.state = DraftState::Editing;
        }
    }
}
