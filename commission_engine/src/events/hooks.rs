use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    CommissionCreditedEvent,
    DeadLetterEvent,
    DisputeAlertEvent,
    EventHandler,
    EventProducer,
    Handler,
    MarketingSuppressionEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub commission_credited_producer: Vec<EventProducer<CommissionCreditedEvent>>,
    pub dispute_alert_producer: Vec<EventProducer<DisputeAlertEvent>>,
    pub dead_letter_producer: Vec<EventProducer<DeadLetterEvent>>,
    pub marketing_suppression_producer: Vec<EventProducer<MarketingSuppressionEvent>>,
}

pub struct EventHandlers {
    pub on_commission_credited: Option<EventHandler<CommissionCreditedEvent>>,
    pub on_dispute_alert: Option<EventHandler<DisputeAlertEvent>>,
    pub on_dead_letter: Option<EventHandler<DeadLetterEvent>>,
    pub on_marketing_suppression: Option<EventHandler<MarketingSuppressionEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_commission_credited = hooks.on_commission_credited.map(|f| EventHandler::new(buffer_size, f));
        let on_dispute_alert = hooks.on_dispute_alert.map(|f| EventHandler::new(buffer_size, f));
        let on_dead_letter = hooks.on_dead_letter.map(|f| EventHandler::new(buffer_size, f));
        let on_marketing_suppression = hooks.on_marketing_suppression.map(|f| EventHandler::new(buffer_size, f));
        Self { on_commission_credited, on_dispute_alert, on_dead_letter, on_marketing_suppression }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_commission_credited {
            result.commission_credited_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_dispute_alert {
            result.dispute_alert_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_dead_letter {
            result.dead_letter_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_marketing_suppression {
            result.marketing_suppression_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_commission_credited {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_dispute_alert {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_dead_letter {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_marketing_suppression {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_commission_credited: Option<Handler<CommissionCreditedEvent>>,
    pub on_dispute_alert: Option<Handler<DisputeAlertEvent>>,
    pub on_dead_letter: Option<Handler<DeadLetterEvent>>,
    pub on_marketing_suppression: Option<Handler<MarketingSuppressionEvent>>,
}

impl EventHooks {
    pub fn on_commission_credited<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CommissionCreditedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_commission_credited = Some(Arc::new(f));
        self
    }

    pub fn on_dispute_alert<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DisputeAlertEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_dispute_alert = Some(Arc::new(f));
        self
    }

    pub fn on_dead_letter<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DeadLetterEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_dead_letter = Some(Arc::new(f));
        self
    }

    pub fn on_marketing_suppression<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MarketingSuppressionEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_marketing_suppression = Some(Arc::new(f));
        self
    }
}
