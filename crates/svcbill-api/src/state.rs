//! Shared application services

use std::sync::Arc;
use svcbill_core::config::SuspensionConfig;
use svcbill_core::traits::BillingStore;
use svcbill_services::{
    ManualInvoiceService, PaymentWebhookAdapter, ServiceManager, SuspensionHandler, SweepScheduler,
};

/// Services wired over one store, registered as `web::Data<AppServices<S>>`
pub struct AppServices<S: BillingStore> {
    pub manager: Arc<ServiceManager<S>>,
    pub handler: Arc<SuspensionHandler<S>>,
    pub webhook: Arc<PaymentWebhookAdapter<S>>,
    pub invoices: Arc<ManualInvoiceService<S>>,
    config: SuspensionConfig,
}

impl<S: BillingStore> AppServices<S> {
    pub fn new(store: Arc<S>, config: &SuspensionConfig) -> Self {
        let manager = Arc::new(ServiceManager::new(store.clone(), config));
        let handler = Arc::new(SuspensionHandler::new(
            store.clone(),
            manager.clone(),
            config,
        ));
        let webhook = Arc::new(PaymentWebhookAdapter::new(
            store.clone(),
            handler.clone(),
            config,
        ));
        let invoices = Arc::new(ManualInvoiceService::new(store, config));

        Self {
            manager,
            handler,
            webhook,
            invoices,
            config: config.clone(),
        }
    }

    /// Background sweep sharing this instance's handler
    pub fn scheduler(&self) -> SweepScheduler<S> {
        SweepScheduler::new(self.handler.clone(), &self.config)
    }
}

impl<S: BillingStore> Clone for AppServices<S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            handler: self.handler.clone(),
            webhook: self.webhook.clone(),
            invoices: self.invoices.clone(),
            config: self.config.clone(),
        }
    }
}
