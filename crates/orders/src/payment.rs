//! Balance-driven payment reconciliation.
//!
//! Payments are recorded against an order's remaining balance; settling the
//! balance completes the order. Voided payments stay on the order for audit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use brigade_core::money::{covers, within_tolerance};
use brigade_core::{DomainError, UserId, impl_uuid_newtype};

use crate::order::{
    BillReopened, BillRequested, ItemServed, KitchenStatus, Order, OrderCompleted, OrderEvent,
    OrderId, OrderStatus, PaymentRecorded, PaymentVoided, RecordPayment, RequestBill, VoidPayment,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl_uuid_newtype!(PaymentId, "PaymentId");

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitPaymentId(Uuid);

impl_uuid_newtype!(SplitPaymentId, "SplitPaymentId");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
    Voucher,
    Other,
}

impl core::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "mobile" => Ok(PaymentMethod::Mobile),
            "voucher" => Ok(PaymentMethod::Voucher),
            "other" => Ok(PaymentMethod::Other),
            other => Err(DomainError::validation(format!("unknown payment method '{other}'"))),
        }
    }
}

/// Share of one payment attributed to a single payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPayment {
    pub split_id: SplitPaymentId,
    pub payer_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub received_by: Option<UserId>,
    pub received_at: DateTime<Utc>,
    pub voided: bool,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub splits: Vec<SplitPayment>,
}

/// Read-only payment aggregation for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub order_id: OrderId,
    pub order_status: OrderStatus,
    pub total: Decimal,
    pub paid: Decimal,
    pub remaining: Decimal,
    pub fully_paid: bool,
    pub payments: Vec<Payment>,
}

/// Outcome of a recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub fully_paid: bool,
    pub paid: Decimal,
    pub remaining: Decimal,
    pub order_status: OrderStatus,
}

impl Order {
    /// Sum of non-voided payments.
    pub fn paid_amount(&self) -> Decimal {
        self.payments
            .iter()
            .filter(|p| !p.voided)
            .map(|p| p.amount)
            .sum()
    }

    /// `total - paid`, never negative.
    pub fn remaining_balance(&self) -> Decimal {
        (self.total_amount - self.paid_amount()).max(Decimal::ZERO)
    }

    /// Paid in full within the money tolerance.
    pub fn is_fully_paid(&self) -> bool {
        self.total_amount > Decimal::ZERO && covers(self.paid_amount(), self.total_amount)
    }

    pub fn payment_summary(&self) -> PaymentSummary {
        PaymentSummary {
            order_id: self.id,
            order_status: self.status,
            total: self.total_amount,
            paid: self.paid_amount(),
            remaining: self.remaining_balance(),
            fully_paid: self.is_fully_paid(),
            payments: self.payments.clone(),
        }
    }

    /// Receipt for a payment already applied to this order.
    pub fn receipt_for(&self, payment_id: PaymentId) -> Option<PaymentReceipt> {
        let payment = self.payment(payment_id)?.clone();
        Some(PaymentReceipt {
            payment,
            fully_paid: self.is_fully_paid(),
            paid: self.paid_amount(),
            remaining: self.remaining_balance(),
            order_status: self.status,
        })
    }

    pub(crate) fn handle_request_bill(&self, cmd: &RequestBill) -> Result<Vec<OrderEvent>, DomainError> {
        match self.status {
            OrderStatus::ReadyToPay => Ok(vec![]),
            OrderStatus::Served if self.total_amount > Decimal::ZERO => {
                Ok(vec![OrderEvent::BillRequested(BillRequested {
                    order_id: self.id,
                    total: self.total_amount,
                    occurred_at: cmd.occurred_at,
                })])
            }
            OrderStatus::Served => Err(DomainError::invalid_transition(
                "cannot request the bill for an order with nothing to pay",
            )),
            other => Err(DomainError::invalid_transition(format!(
                "cannot request the bill: order is {other}"
            ))),
        }
    }

    fn validate_splits(&self, cmd: &RecordPayment) -> Result<(), DomainError> {
        if cmd.splits.is_empty() {
            return Ok(());
        }
        for split in &cmd.splits {
            if split.payer_name.trim().is_empty() {
                return Err(DomainError::validation("split payer name is required"));
            }
            if split.amount <= Decimal::ZERO {
                return Err(DomainError::validation("split amount must be positive"));
            }
        }
        let split_total: Decimal = cmd.splits.iter().map(|s| s.amount).sum();
        if !within_tolerance(split_total, cmd.amount) {
            return Err(DomainError::SplitMismatch {
                amount: cmd.amount,
                split_total,
            });
        }
        Ok(())
    }

    pub(crate) fn handle_record_payment(
        &self,
        cmd: &RecordPayment,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_not_terminal("record payment")?;

        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if self.payment(cmd.payment_id).is_some() {
            return Err(DomainError::validation(format!(
                "payment {} already recorded",
                cmd.payment_id
            )));
        }

        let remaining = self.total_amount - self.paid_amount();
        if cmd.amount > remaining {
            return Err(DomainError::Overpayment {
                amount: cmd.amount,
                remaining,
            });
        }
        self.validate_splits(cmd)?;

        let payment = Payment {
            payment_id: cmd.payment_id,
            amount: cmd.amount,
            method: cmd.method,
            received_by: cmd.received_by,
            received_at: cmd.occurred_at,
            voided: false,
            voided_at: None,
            void_reason: None,
            splits: cmd.splits.clone(),
        };

        let mut events = vec![OrderEvent::PaymentRecorded(PaymentRecorded {
            order_id: self.id,
            payment,
            occurred_at: cmd.occurred_at,
        })];

        let paid = self.paid_amount() + cmd.amount;
        if covers(paid, self.total_amount) {
            for item in self
                .live_items()
                .filter(|i| i.kitchen_status == KitchenStatus::Ready)
            {
                events.push(OrderEvent::ItemServed(ItemServed {
                    order_id: self.id,
                    item_id: item.item_id,
                    occurred_at: cmd.occurred_at,
                }));
            }
            events.push(OrderEvent::OrderCompleted(OrderCompleted {
                order_id: self.id,
                total: self.total_amount,
                paid,
                occurred_at: cmd.occurred_at,
            }));
        } else if self.status == OrderStatus::ReadyToPay {
            events.push(OrderEvent::BillReopened(BillReopened {
                order_id: self.id,
                remaining: self.total_amount - paid,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    pub(crate) fn handle_void_payment(&self, cmd: &VoidPayment) -> Result<Vec<OrderEvent>, DomainError> {
        let payment = self.payment(cmd.payment_id).ok_or_else(|| {
            DomainError::not_found(format!("payment {} on order {}", cmd.payment_id, self.id))
        })?;

        if payment.voided {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::PaymentVoided(PaymentVoided {
            order_id: self.id,
            payment_id: payment.payment_id,
            amount: payment.amount,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
