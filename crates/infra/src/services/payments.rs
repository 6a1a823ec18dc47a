//! Cashier-facing operations: billing, payments, voids.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

use brigade_core::{DomainError, UserId};
use brigade_orders::{
    OrderCommand, OrderId, OrderStatus, PaymentId, PaymentMethod, PaymentReceipt, PaymentSummary,
    RecordPayment, RequestBill, SplitPayment, SplitPaymentId, VoidPayment,
};

use super::OrderCore;
use crate::command_dispatcher::DispatchError;

#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub payer_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub splits: Vec<SplitRequest>,
    pub received_by: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct PaymentReconciler {
    core: OrderCore,
}

impl PaymentReconciler {
    pub fn new(core: OrderCore) -> Self {
        Self { core }
    }

    /// `Served -> ReadyToPay`.
    #[tracing::instrument(skip_all, fields(%order_id))]
    pub async fn request_bill(&self, order_id: OrderId) -> Result<PaymentSummary, DispatchError> {
        let order = self
            .core
            .execute(order_id, move |_| {
                Ok(OrderCommand::RequestBill(RequestBill {
                    order_id,
                    occurred_at: Utc::now(),
                }))
            })
            .await?;
        Ok(order.payment_summary())
    }

    /// Record a payment and reconcile the balance. A payment covering the
    /// remaining balance completes the order and releases its table.
    #[tracing::instrument(skip_all, fields(%order_id, amount = %req.amount, method = ?req.method))]
    pub async fn record_payment(
        &self,
        order_id: OrderId,
        req: RecordPaymentRequest,
    ) -> Result<PaymentReceipt, DispatchError> {
        let payment_id = PaymentId::new();
        let splits: Vec<SplitPayment> = req
            .splits
            .into_iter()
            .map(|s| SplitPayment {
                split_id: SplitPaymentId::new(),
                payer_name: s.payer_name,
                amount: s.amount,
            })
            .collect();
        let (amount, method, received_by) = (req.amount, req.method, req.received_by);

        let order = self
            .core
            .execute(order_id, move |_| {
                Ok(OrderCommand::RecordPayment(RecordPayment {
                    order_id,
                    payment_id,
                    amount,
                    method,
                    splits: splits.clone(),
                    received_by,
                    occurred_at: Utc::now(),
                }))
            })
            .await?;

        let receipt = order.receipt_for(payment_id).ok_or_else(|| {
            DomainError::invariant(format!("payment {payment_id} missing after commit"))
        })?;

        self.core.emit(
            "payment.processed",
            json!({
                "order_id": order_id,
                "payment_id": payment_id,
                "amount": receipt.payment.amount,
                "method": receipt.payment.method,
                "paid": receipt.paid,
                "remaining": receipt.remaining,
                "fully_paid": receipt.fully_paid,
                "order_status": receipt.order_status,
                "at": receipt.payment.received_at,
            }),
        );

        if receipt.order_status == OrderStatus::Completed {
            tracing::info!(%order_id, %payment_id, paid = %receipt.paid, "order completed");
        }
        Ok(receipt)
    }

    /// Void a payment by id. The owning order keeps its status; only the
    /// balance is recomputed.
    #[tracing::instrument(skip_all, fields(%payment_id))]
    pub async fn void_payment(
        &self,
        payment_id: PaymentId,
        reason: Option<String>,
    ) -> Result<PaymentSummary, DispatchError> {
        let order_id = self
            .core
            .board()
            .order_for_payment(payment_id)
            .ok_or_else(|| DomainError::not_found(format!("payment {payment_id}")))?;

        let order = self
            .core
            .execute(order_id, move |_| {
                Ok(OrderCommand::VoidPayment(VoidPayment {
                    order_id,
                    payment_id,
                    reason: reason.clone(),
                    occurred_at: Utc::now(),
                }))
            })
            .await?;

        tracing::info!(%order_id, %payment_id, "payment voided");
        Ok(order.payment_summary())
    }

    pub async fn payment_summary(&self, order_id: OrderId) -> Result<PaymentSummary, DispatchError> {
        Ok(self.core.load_order(order_id).await?.payment_summary())
    }
}
