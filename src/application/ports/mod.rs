pub mod outbound;

pub use outbound::{
    AutoApproveRefundGateway, LoggingSubscriptionActivator, RefundGateway, RefundRequest,
    RefundResponse, SubscriptionActivator,
};
