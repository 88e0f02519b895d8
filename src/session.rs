use crate::acquisition::{
    self, ConversionTicket, InputAcquisition, InputEvent, PendingConversion,
};
use crate::config::{AcquisitionConfig, WorkflowConfig};
use crate::error::{AcquisitionError, PredictionError, SessionError};
use crate::image_asset::ImageAsset;
use crate::prediction::{AnalysisResult, Predictor};
use crate::workflow::{
    Effect, Event, Notification, RequestToken, WorkflowController, WorkflowState,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

const NOTIFICATION_CAPACITY: usize = 16;

/// What the front-end can ask of a running session.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Input(InputEvent),
    PickPath(PathBuf),
    DropPath(PathBuf),
    Analyze,
    Clear,
}

#[derive(Debug)]
enum Message {
    Command(SessionCommand),
    FileRead {
        ticket: ConversionTicket,
        result: Result<acquisition::FileInput, AcquisitionError>,
    },
    Converted {
        ticket: ConversionTicket,
        result: Result<ImageAsset, AcquisitionError>,
    },
    Predicted {
        token: RequestToken,
        result: Result<AnalysisResult, PredictionError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: WorkflowState,
    pub dragging: bool,
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Message>,
    snapshot_rx: watch::Receiver<Snapshot>,
    notifications: broadcast::Sender<Notification>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx
            .send(Message::Command(command))
            .map_err(|_| SessionError::Closed)
    }

    pub fn input(&self, event: InputEvent) -> Result<(), SessionError> {
        self.send(SessionCommand::Input(event))
    }

    pub fn analyze(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Analyze)
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Clear)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }
}

/// Single writer over the workflow. Every state change happens on the task
/// running [`Session::run`]; slow work is spawned and reports back through
/// the same queue.
pub struct Session<P: Predictor> {
    controller: WorkflowController,
    acquisition: InputAcquisition,
    predictor: Arc<P>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    snapshot_tx: watch::Sender<Snapshot>,
    notifications: broadcast::Sender<Notification>,
}

impl<P: Predictor> Session<P> {
    pub fn new(
        acquisition_config: &AcquisitionConfig,
        workflow_config: &WorkflowConfig,
        predictor: P,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            state: WorkflowState::Idle,
            dragging: false,
        });
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let handle = SessionHandle {
            tx: tx.clone(),
            snapshot_rx,
            notifications: notifications.clone(),
        };
        let session = Self {
            controller: WorkflowController::new(workflow_config),
            acquisition: InputAcquisition::new(acquisition_config),
            predictor: Arc::new(predictor),
            tx,
            rx,
            snapshot_tx,
            notifications,
        };

        (session, handle)
    }

    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::info!("Workflow session started");
        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    match message {
                        Some(message) => self.process(message),
                        None => break,
                    }
                },
                _ = shutdown_rx.recv() => {
                    tracing::info!("Workflow session received shutdown signal");
                    break;
                }
            }
        }
        tracing::info!("Workflow session stopped");
    }

    fn process(&mut self, message: Message) {
        match message {
            Message::Command(SessionCommand::Input(event)) => self.acquire(event),
            Message::Command(SessionCommand::PickPath(path)) => self.read_path(path),
            Message::Command(SessionCommand::DropPath(path)) => {
                self.acquire(InputEvent::Drop(vec![]));
                self.read_path(path);
            }
            Message::Command(SessionCommand::Analyze) => self.dispatch(Event::Analyze),
            Message::Command(SessionCommand::Clear) => {
                self.acquisition.invalidate();
                self.dispatch(Event::Clear);
            }
            Message::FileRead { ticket, result } => match result {
                Ok(file) => {
                    let outcome = self.acquisition.complete(ticket, file);
                    self.start_conversion(outcome);
                }
                Err(e) => tracing::warn!("Failed to read selected file: {}", e),
            },
            Message::Converted { ticket, result } => match result {
                Ok(asset) => {
                    if let Some(asset) = self.acquisition.accept(ticket, asset) {
                        self.dispatch(Event::Select(asset));
                    }
                }
                Err(e) => tracing::error!("Failed to encode image for display: {}", e),
            },
            Message::Predicted { token, result } => {
                let event = match result {
                    Ok(result) => Event::Resolve { result, token },
                    Err(error) => Event::Reject { error, token },
                };
                self.dispatch(event);
            }
        }
        self.publish();
    }

    fn acquire(&mut self, event: InputEvent) {
        let outcome = self.acquisition.handle(event);
        self.start_conversion(outcome);
    }

    fn start_conversion(&self, outcome: Result<Option<PendingConversion>, AcquisitionError>) {
        match outcome {
            Ok(Some(pending)) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = acquisition::convert(pending.chosen).await;
                    let _ = tx.send(Message::Converted {
                        ticket: pending.ticket,
                        result,
                    });
                });
            }
            Ok(None) => {}
            Err(AcquisitionError::NotAnImage {
                filename,
                mime_type,
            }) => {
                self.notify(Notification::input_rejected(&filename, &mime_type));
            }
            Err(e) => tracing::warn!("Input rejected: {}", e),
        }
    }

    fn read_path(&mut self, path: PathBuf) {
        let ticket = self.acquisition.reserve();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = acquisition::read_file(&path).await;
            let _ = tx.send(Message::FileRead { ticket, result });
        });
    }

    fn dispatch(&mut self, event: Event) {
        for effect in self.controller.dispatch(event) {
            self.run_effect(effect);
        }
    }

    fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::Predict { image_data, token } => {
                let predictor = self.predictor.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = predictor.predict(image_data).await;
                    let _ = tx.send(Message::Predicted { token, result });
                });
            }
            Effect::Notify(notification) => self.notify(notification),
        }
    }

    fn notify(&self, notification: Notification) {
        // no subscribers is fine, notifications are transient
        let _ = self.notifications.send(notification);
    }

    fn publish(&self) {
        let snapshot = Snapshot {
            state: self.controller.state().clone(),
            dragging: self.acquisition.is_dragging(),
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
