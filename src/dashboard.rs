//! Controller side of the display: turns sensor readings into the status word,
//! the reading text, the theme and the trend line, and pushes them into a
//! [`Compositor`].

use crate::{
    color::{ColorRamp, Status, ThemeState},
    compositor::Compositor,
    config::PipelineConfig,
    sparkline::{SparklineConfig, SparklineGeometry},
};

/// One sensor report. Either channel may be missing.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Reading {
    pub timestamp_ms: i64,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub humidity_pct: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesPoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Metric {
    #[default]
    Temperature,
    Humidity,
}

impl Metric {
    pub fn toggled(self) -> Self {
        match self {
            Self::Temperature => Self::Humidity,
            Self::Humidity => Self::Temperature,
        }
    }
}

/// `true` when the readings cover at least `window_ms` from first to last.
pub fn spans_at_least(readings: &[Reading], window_ms: i64) -> bool {
    match (readings.first(), readings.last()) {
        (Some(first), Some(last)) => {
            last.timestamp_ms.saturating_sub(first.timestamp_ms) >= window_ms
        }
        _ => false,
    }
}

/// Trailing run of readings no older than `window_ms` before `now_ms`.
///
/// Walks back from the newest reading and stops at the first one outside the
/// window, so the input is expected in timestamp order.
pub fn recent_window(readings: &[Reading], window_ms: i64, now_ms: i64) -> &[Reading] {
    let start = readings
        .iter()
        .rposition(|r| now_ms.saturating_sub(r.timestamp_ms) > window_ms)
        .map_or(0, |i| i + 1);
    &readings[start..]
}

/// Celsius to whole degrees Fahrenheit, halves rounding up.
pub fn celsius_to_fahrenheit(celsius: f64) -> i64 {
    round_half_up(celsius * 9.0 / 5.0 + 32.0)
}

fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

fn series(readings: &[Reading], pick: impl Fn(&Reading) -> Option<f64>) -> Vec<SeriesPoint> {
    readings
        .iter()
        .filter_map(|r| {
            pick(r)
                .filter(|v| v.is_finite())
                .map(|value| SeriesPoint {
                    timestamp_ms: r.timestamp_ms,
                    value,
                })
        })
        .collect()
}

/// Everything the display shows for the current readings and metric.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardView {
    pub status: Status,
    pub value_text: String,
    pub theme: ThemeState,
    pub metric: Metric,
    /// `None` while fewer than two points are available.
    pub sparkline: Option<SparklineGeometry>,
}

impl DashboardView {
    /// Theme first, so the status line is redrawn once in its final color.
    pub fn apply(&self, compositor: &mut Compositor) {
        compositor.set_theme(&self.theme);
        compositor.set_text(self.status.label(), &self.value_text);
    }

    pub fn sparkline_svg(&self, config: &SparklineConfig) -> Option<String> {
        self.sparkline
            .as_ref()
            .map(|g| g.to_svg(&self.theme, config))
    }
}

pub struct Dashboard {
    ramp: ColorRamp,
    sparkline: SparklineConfig,
    metric: Metric,
    temperature: Vec<SeriesPoint>,
    humidity: Vec<SeriesPoint>,
    latest_fahrenheit: Option<i64>,
    latest_humidity: Option<i64>,
}

impl Dashboard {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            ramp: config.theme,
            sparkline: config.sparkline,
            metric: Metric::default(),
            temperature: Vec::new(),
            humidity: Vec::new(),
            latest_fahrenheit: None,
            latest_humidity: None,
        }
    }

    /// Replace the series with `readings`. Returns `false` and keeps the previous
    /// state when no reading carries a usable temperature.
    pub fn ingest(&mut self, readings: &[Reading]) -> bool {
        let temperature = series(readings, |r| r.temperature_c);
        let Some(last) = temperature.last() else {
            tracing::debug!(readings = readings.len(), "no usable temperature; keeping view");
            return false;
        };
        let humidity = series(readings, |r| r.humidity_pct);

        self.latest_fahrenheit = Some(celsius_to_fahrenheit(last.value));
        self.latest_humidity = humidity.last().map(|p| round_half_up(p.value));
        self.temperature = temperature;
        self.humidity = humidity;
        tracing::debug!(
            fahrenheit = self.latest_fahrenheit,
            points = self.temperature.len(),
            "readings ingested"
        );
        true
    }

    pub fn toggle_metric(&mut self) -> Metric {
        self.metric = self.metric.toggled();
        self.metric
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn latest_fahrenheit(&self) -> Option<i64> {
        self.latest_fahrenheit
    }

    pub fn latest_humidity(&self) -> Option<i64> {
        self.latest_humidity
    }

    pub fn temperature_series(&self) -> &[SeriesPoint] {
        &self.temperature
    }

    pub fn humidity_series(&self) -> &[SeriesPoint] {
        &self.humidity
    }

    /// The current view, or `None` before the first successful ingest.
    pub fn view(&self) -> Option<DashboardView> {
        let fahrenheit = self.latest_fahrenheit?;
        let f = fahrenheit as f64;

        let (value_text, points) = match self.metric {
            Metric::Temperature => (format!("{fahrenheit}°F"), &self.temperature),
            // No humidity yet leaves the value line empty.
            Metric::Humidity => (
                self.latest_humidity
                    .map(|h| format!("{h}%"))
                    .unwrap_or_default(),
                &self.humidity,
            ),
        };
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();

        Some(DashboardView {
            status: self.ramp.classify(f),
            value_text,
            theme: self.ramp.theme_for(f),
            metric: self.metric,
            sparkline: SparklineGeometry::build(&values, &self.sparkline),
        })
    }
}
