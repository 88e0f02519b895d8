use crate::config::WorkflowConfig;
use crate::error::PredictionError;
use crate::image_asset::ImageAsset;
use crate::prediction::AnalysisResult;
use bytes::Bytes;
use std::fmt;

/// Identifies one analysis request. Minted fresh on every ANALYZE that
/// actually starts a request; a response carrying any other token is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    Selected {
        image: ImageAsset,
    },
    Analyzing {
        image: ImageAsset,
        token: RequestToken,
    },
    Completed {
        image: ImageAsset,
        result: AnalysisResult,
    },
    Failed {
        image: ImageAsset,
        error: PredictionError,
    },
}

impl WorkflowState {
    pub fn image(&self) -> Option<&ImageAsset> {
        match self {
            WorkflowState::Idle => None,
            WorkflowState::Selected { image }
            | WorkflowState::Analyzing { image, .. }
            | WorkflowState::Completed { image, .. }
            | WorkflowState::Failed { image, .. } => Some(image),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Selected { .. } => "selected",
            WorkflowState::Analyzing { .. } => "analyzing",
            WorkflowState::Completed { .. } => "completed",
            WorkflowState::Failed { .. } => "failed",
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, WorkflowState::Analyzing { .. })
    }
}

#[derive(Debug)]
pub enum Event {
    Select(ImageAsset),
    Clear,
    Analyze,
    Resolve {
        result: AnalysisResult,
        token: RequestToken,
    },
    Reject {
        error: PredictionError,
        token: RequestToken,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Transient, non-blocking message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn analysis_completed(brand: &str) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: "Analysis complete".into(),
            description: format!("Identified a {}", brand),
        }
    }

    pub fn analysis_failed() -> Self {
        Self {
            level: NotificationLevel::Error,
            title: "Error".into(),
            description: "Could not reach the analysis server.".into(),
        }
    }

    pub fn input_rejected(filename: &str, mime_type: &str) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: "Unsupported file".into(),
            description: format!("{} is not an image ({})", filename, mime_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Predict {
        image_data: Bytes,
        token: RequestToken,
    },
    Notify(Notification),
}

/// Sole owner of the workflow state.
#[derive(Debug)]
pub struct WorkflowController {
    state: WorkflowState,
    last_token: u64,
    retry_from_failed: bool,
}

impl WorkflowController {
    pub fn new(config: &WorkflowConfig) -> Self {
        Self {
            state: WorkflowState::Idle,
            last_token: 0,
            retry_from_failed: config.retry_from_failed,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn dispatch(&mut self, event: Event) -> Vec<Effect> {
        let previous = std::mem::replace(&mut self.state, WorkflowState::Idle);
        let from = previous.name();
        let (next, effects) = self.transition(previous, event);

        if from != next.name() {
            tracing::debug!(from, to = next.name(), "Workflow transition");
        }
        self.state = next;

        effects
    }

    fn transition(&mut self, state: WorkflowState, event: Event) -> (WorkflowState, Vec<Effect>) {
        match (state, event) {
            (state, Event::Select(image)) => {
                if let WorkflowState::Analyzing { token, .. } = &state {
                    tracing::debug!(%token, "Outstanding analysis superseded by a new selection");
                }
                (WorkflowState::Selected { image }, vec![])
            }

            (WorkflowState::Idle, Event::Clear) => (WorkflowState::Idle, vec![]),
            (state, Event::Clear) => {
                if let WorkflowState::Analyzing { token, .. } = &state {
                    tracing::debug!(%token, "Outstanding analysis abandoned by clear");
                }
                (WorkflowState::Idle, vec![])
            }

            (WorkflowState::Selected { image }, Event::Analyze) => self.start_analysis(image),
            (WorkflowState::Failed { image, error }, Event::Analyze) => {
                if self.retry_from_failed {
                    self.start_analysis(image)
                } else {
                    tracing::debug!("Retry from failed state disabled, reselect the image");
                    (WorkflowState::Failed { image, error }, vec![])
                }
            }
            (state @ WorkflowState::Analyzing { .. }, Event::Analyze) => {
                tracing::debug!("Analysis already in flight, ignoring analyze");
                (state, vec![])
            }
            (state, Event::Analyze) => (state, vec![]),

            (
                WorkflowState::Analyzing { image, token },
                Event::Resolve {
                    result,
                    token: response_token,
                },
            ) if response_token == token => {
                tracing::info!(
                    %token,
                    brand = %result.brand,
                    confidence = result.confidence,
                    "Analysis completed"
                );
                let effects = vec![Effect::Notify(Notification::analysis_completed(
                    &result.brand,
                ))];
                (WorkflowState::Completed { image, result }, effects)
            }
            (
                WorkflowState::Analyzing { image, token },
                Event::Reject {
                    error,
                    token: response_token,
                },
            ) if response_token == token => {
                tracing::warn!(%token, error = %error, "Analysis failed");
                let effects = vec![Effect::Notify(Notification::analysis_failed())];
                (WorkflowState::Failed { image, error }, effects)
            }
            (state, Event::Resolve { token, .. }) | (state, Event::Reject { token, .. }) => {
                tracing::debug!(%token, state = state.name(), "Discarding stale response");
                (state, vec![])
            }
        }
    }

    fn start_analysis(&mut self, image: ImageAsset) -> (WorkflowState, Vec<Effect>) {
        self.last_token += 1;
        let token = RequestToken::new(self.last_token);
        tracing::info!(%token, filename = image.source_filename(), "Starting analysis");

        let effects = vec![Effect::Predict {
            image_data: image.raw_bytes().clone(),
            token,
        }];
        (WorkflowState::Analyzing { image, token }, effects)
    }
}
