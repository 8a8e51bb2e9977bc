//! Loading screen progress mapping
//!
//! [`LoadingScreen`] is the consumer side of a preload session: it accepts
//! the session's progress and loading flag, turns them into a display
//! percentage and stage label, and fires its completion callback at most
//! once.

use crate::options::CompleteCallback;
use crate::preloader::PreloadState;
use std::fmt;
use std::sync::Arc;

/// Label shown under the progress bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingStage {
    /// Below 30%
    Initializing,
    /// 30% to below 60%
    Connecting,
    /// 60% to below 80%
    LoadingData,
    /// 80% to below 95%
    Preparing,
    /// 95% and above
    Ready,
}

impl LoadingStage {
    /// Stage for a display percentage
    pub fn for_progress(progress: f64) -> Self {
        if progress < 30.0 {
            LoadingStage::Initializing
        } else if progress < 60.0 {
            LoadingStage::Connecting
        } else if progress < 80.0 {
            LoadingStage::LoadingData
        } else if progress < 95.0 {
            LoadingStage::Preparing
        } else {
            LoadingStage::Ready
        }
    }

    /// Text for this stage
    pub fn label(&self) -> &'static str {
        match self {
            LoadingStage::Initializing => "Initializing...",
            LoadingStage::Connecting => "Connecting to API...",
            LoadingStage::LoadingData => "Loading data...",
            LoadingStage::Preparing => "Preparing application...",
            LoadingStage::Ready => "Ready!",
        }
    }
}

impl fmt::Display for LoadingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Next value of the simulated progress curve, used when no real session
/// drives the screen: a fast start, a slow middle, and a final push.
pub fn simulated_next(current: f64) -> f64 {
    let step = if current < 30.0 {
        1.5
    } else if current < 50.0 {
        0.5
    } else if current < 80.0 {
        0.3
    } else {
        0.8
    };
    (current + step).min(100.0)
}

/// Progress display state for the loading screen
pub struct LoadingScreen {
    progress: f64,
    completed: bool,
    on_complete: Option<CompleteCallback>,
}

impl LoadingScreen {
    /// Start at 0% with no completion callback
    pub fn new() -> Self {
        Self::with_initial_progress(0.0)
    }

    /// Start at `initial` percent
    pub fn with_initial_progress(initial: f64) -> Self {
        Self {
            progress: initial.clamp(0.0, 100.0),
            completed: false,
            on_complete: None,
        }
    }

    /// Set the callback fired when the screen reaches 100%
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    /// Feed a progress value and loading flag.
    ///
    /// Values are clamped to 0..=100 and never move the display backwards.
    /// A cleared loading flag means the session is done, so the display
    /// jumps to 100.
    pub fn update(&mut self, progress: u8, is_loading: bool) {
        let target = if is_loading {
            f64::from(progress.min(100))
        } else {
            100.0
        };
        self.advance_to(target);
    }

    /// Feed a preload session's state
    pub fn apply(&mut self, state: &PreloadState) {
        self.update(state.progress, state.is_loading);
    }

    /// Advance along the simulated curve by one step
    pub fn tick_simulated(&mut self) {
        let next = simulated_next(self.progress);
        self.advance_to(next);
    }

    fn advance_to(&mut self, target: f64) {
        if target > self.progress {
            self.progress = target.min(100.0);
        }
        if self.progress >= 100.0 && !self.completed {
            self.completed = true;
            tracing::debug!("loading screen complete");
            if let Some(ref on_complete) = self.on_complete {
                on_complete();
            }
        }
    }

    /// Current display percentage, rounded
    pub fn percent(&self) -> u8 {
        self.progress.round() as u8
    }

    /// Current stage
    pub fn stage(&self) -> LoadingStage {
        LoadingStage::for_progress(self.progress)
    }

    /// Whether the completion callback has fired
    pub fn is_complete(&self) -> bool {
        self.completed
    }
}

impl Default for LoadingScreen {
    fn default() -> Self {
        Self::new()
    }
}
