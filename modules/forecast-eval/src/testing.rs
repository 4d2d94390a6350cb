// Test doubles for the evaluation pipeline.
//
// - ScriptedGenerator (TextGenerator): queued replies, then a fallback reply
//   or a prompt-driven responder; counts every call.
// - Builders for forecasts and regions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ai_client::{AiError, GenerateOptions, TextGenerator};
use async_trait::async_trait;

use crate::types::{MaxTempClaim, Region, StructuredForecast, TempRange};

type Responder = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Replies are served in order: queued entries first, then the responder (if
/// it answers the prompt), then the `always` reply. With nothing left the
/// call fails with a network error.
/// Builder pattern: `.reply()`, `.fail()`, `.always()`, `.respond_with()`.
pub struct ScriptedGenerator {
    queue: Mutex<VecDeque<Result<String, String>>>,
    responder: Option<Responder>,
    fallback: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            fallback: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.queue.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.queue.lock().unwrap().push_back(Err(message.into()));
        self
    }

    pub fn always(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn respond_with(
        mut self,
        responder: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            return next.map_err(AiError::Network);
        }
        if let Some(text) = self.responder.as_ref().and_then(|r| r(prompt)) {
            return Ok(text);
        }
        self.fallback
            .clone()
            .ok_or_else(|| AiError::Network("script exhausted".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Forecast builders
// ---------------------------------------------------------------------------

pub fn region(geo: &[&str], tmax_min: Option<f64>, tmax_max: Option<f64>) -> Region {
    Region {
        geo: geo.iter().map(|g| g.to_string()).collect(),
        tmax_min,
        tmax_max,
        std_geo: Vec::new(),
    }
}

/// Region whose canonical names equal its raw mentions.
pub fn std_region(geo: &[&str], tmax_min: Option<f64>, tmax_max: Option<f64>) -> Region {
    let mut r = region(geo, tmax_min, tmax_max);
    r.std_geo = r.geo.clone();
    r
}

pub fn max_temp(geo: &[&str], tmax: Option<f64>) -> MaxTempClaim {
    let geo: Vec<String> = geo.iter().map(|g| g.to_string()).collect();
    MaxTempClaim {
        std_geo: geo.clone(),
        geo,
        tmax,
    }
}

pub fn forecast(
    specific_regions: Vec<Region>,
    other_regions: Option<(Option<f64>, Option<f64>)>,
    max_temp: Option<MaxTempClaim>,
) -> StructuredForecast {
    StructuredForecast {
        specific_regions,
        other_regions: other_regions.map(|(tmax_min, tmax_max)| TempRange { tmax_min, tmax_max }),
        max_temp,
    }
}
