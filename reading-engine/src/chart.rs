//! Display-ready line-chart data in the chart.js shape.

use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

use crate::{
    aggregate::{ConsumptionSeries, GroupedReadings, Orientation, SeriesInfo},
    config::ChartsConfig,
};

const LINE_TENSION: f64 = 0.3;
const FALLBACK_KEY: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorDescriptor {
    pub label: String,
    pub border_color: String,
    pub background_color: String,
}

impl ColorDescriptor {
    pub fn new(label: &str, border_color: &str, background_color: &str) -> Self {
        Self {
            label: label.to_string(),
            border_color: border_color.to_string(),
            background_color: background_color.to_string(),
        }
    }
}

/// Medium type → color descriptor, with an explicit entry for media the
/// palette does not know.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPalette {
    entries: BTreeMap<String, ColorDescriptor>,
    fallback: ColorDescriptor,
}

impl Default for ChartPalette {
    fn default() -> Self {
        let hot = ColorDescriptor::new("Hot Water", "#ef4444", "rgba(239, 68, 68, 0.2)");
        let cold = ColorDescriptor::new("Cold Water", "#3b82f6", "rgba(59, 130, 246, 0.2)");
        let water = ColorDescriptor::new("Water", "#3b82f6", "rgba(59, 130, 246, 0.2)");

        Self {
            entries: BTreeMap::from([
                ("hot".to_string(), hot),
                ("cold".to_string(), cold),
                ("water".to_string(), water),
            ]),
            fallback: ColorDescriptor::new("", "#6b7280", "rgba(107, 114, 128, 0.2)"),
        }
    }
}

impl ChartPalette {
    pub fn with_entry(mut self, medium: &str, descriptor: ColorDescriptor) -> Self {
        let medium = medium.trim().to_lowercase();
        if medium == FALLBACK_KEY {
            self.fallback = descriptor;
        } else {
            self.entries.insert(medium, descriptor);
        }
        self
    }

    /// Built-in palette with the `[charts.palette.*]` overrides applied. An
    /// override without a label keeps the label it replaces.
    pub fn from_config(config: &ChartsConfig) -> Self {
        config
            .palette
            .iter()
            .fold(Self::default(), |palette, (medium, entry)| {
                let label = match &entry.label {
                    Some(label) => label.clone(),
                    None if medium == FALLBACK_KEY => palette.fallback.label.clone(),
                    None => palette.descriptor(medium).label,
                };
                palette.with_entry(
                    medium,
                    ColorDescriptor {
                        label,
                        border_color: entry.border_color.clone(),
                        background_color: entry.background_color.clone(),
                    },
                )
            })
    }

    /// Descriptor for `medium`. Unknown media get the fallback colors and are
    /// labelled with the medium type itself.
    pub fn descriptor(&self, medium: &str) -> ColorDescriptor {
        match self.entries.get(medium) {
            Some(descriptor) => descriptor.clone(),
            None => {
                let mut descriptor = self.fallback.clone();
                if descriptor.label.is_empty() {
                    descriptor.label = medium.to_string();
                }
                descriptor
            }
        }
    }

    fn for_series(&self, series: &SeriesInfo) -> ColorDescriptor {
        let mut descriptor = self.descriptor(series.medium.as_str());
        if series.is_shared_medium() {
            descriptor.label = format!("{} #{}", descriptor.label, series.counter_id);
        }
        descriptor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    /// `None` where the series has no point in the period.
    pub data: Vec<Option<f64>>,
    pub border_color: String,
    pub background_color: String,
    pub tension: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

pub fn month_label(date: Date) -> String {
    let name = date.month().to_string();
    name.chars().take(3).collect()
}

pub struct ChartProjector {
    palette: ChartPalette,
}

impl ChartProjector {
    pub fn new(palette: ChartPalette) -> Self {
        Self { palette }
    }

    fn dataset(&self, series: &SeriesInfo, suffix: &str, data: Vec<Option<f64>>) -> Dataset {
        let descriptor = self.palette.for_series(series);
        Dataset {
            label: format!("{}{}", descriptor.label, suffix),
            data,
            border_color: descriptor.border_color,
            background_color: descriptor.background_color,
            tension: LINE_TENSION,
        }
    }

    /// Raw meter values per period, oldest first.
    pub fn readings_chart(&self, grouped: &GroupedReadings) -> ChartData {
        let records = grouped.records(Orientation::Ascending);
        ChartData {
            labels: records.iter().map(|r| month_label(r.period)).collect(),
            datasets: grouped
                .series
                .iter()
                .map(|series| {
                    let data = records
                        .iter()
                        .map(|r| r.values.get(&series.key).copied())
                        .collect();
                    self.dataset(series, "", data)
                })
                .collect(),
        }
    }

    /// Period consumption, oldest first. A baseline period has no consumption
    /// to plot and renders as a gap.
    pub fn consumption_chart(&self, consumption: &ConsumptionSeries) -> ChartData {
        let records = consumption.records(Orientation::Ascending);
        ChartData {
            labels: records.iter().map(|r| month_label(r.period)).collect(),
            datasets: consumption
                .series
                .iter()
                .map(|series| {
                    let data = records
                        .iter()
                        .map(|r| r.deltas.get(&series.key).and_then(|d| d.value()))
                        .collect();
                    self.dataset(series, " consumption", data)
                })
                .collect(),
        }
    }
}

impl Default for ChartProjector {
    fn default() -> Self {
        Self::new(ChartPalette::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::{apartment_consumption, group_by_period, Granularity},
        config::PaletteEntryConfig,
        testing::{apartment, counter, reading},
    };
    use meter_client::domain::Apartment;
    use time::macros::date;

    fn two_media() -> Apartment {
        apartment(
            4,
            vec![
                counter(
                    1,
                    "hot",
                    vec![
                        reading(1, 10.0, date!(2025-01-10)),
                        reading(1, 12.5, date!(2025-03-10)),
                    ],
                ),
                counter(
                    2,
                    "cold",
                    vec![
                        reading(2, 20.0, date!(2025-01-10)),
                        reading(2, 23.0, date!(2025-02-10)),
                        reading(2, 27.0, date!(2025-03-10)),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn month_labels_are_short_english_names() {
        assert_eq!(month_label(date!(2025-01-31)), "Jan");
        assert_eq!(month_label(date!(2025-09-01)), "Sep");
        assert_eq!(month_label(date!(2025-12-15)), "Dec");
    }

    #[test]
    fn readings_chart_has_null_points_for_absent_slots() {
        let grouped = group_by_period(&two_media(), Granularity::Day);
        let chart = ChartProjector::default().readings_chart(&grouped);

        assert_eq!(chart.labels, vec!["Jan", "Feb", "Mar"]);
        assert_eq!(chart.datasets.len(), 2);
        assert_eq!(chart.datasets[0].label, "Hot Water");
        assert_eq!(chart.datasets[0].data, vec![Some(10.0), None, Some(12.5)]);
        assert_eq!(chart.datasets[0].border_color, "#ef4444");
        assert_eq!(chart.datasets[1].label, "Cold Water");
        assert_eq!(chart.datasets[1].data, vec![Some(20.0), Some(23.0), Some(27.0)]);
    }

    #[test]
    fn consumption_chart_renders_baseline_as_gap() {
        let series = apartment_consumption(&two_media(), Granularity::Day);
        let chart = ChartProjector::default().consumption_chart(&series);

        assert_eq!(chart.datasets[0].label, "Hot Water consumption");
        assert_eq!(chart.datasets[0].data, vec![None, None, Some(2.5)]);
        assert_eq!(chart.datasets[1].data, vec![None, Some(3.0), Some(4.0)]);
    }

    #[test]
    fn unknown_medium_falls_back_to_default_descriptor() {
        let palette = ChartPalette::default();
        let gas = palette.descriptor("gas");
        assert_eq!(gas.label, "gas");
        assert_eq!(gas.border_color, "#6b7280");
        assert_eq!(palette.descriptor("hot").border_color, "#ef4444");
    }

    #[test]
    fn config_overrides_colors_and_fallback() {
        let config = ChartsConfig {
            palette: BTreeMap::from([
                (
                    "hot".to_string(),
                    PaletteEntryConfig {
                        label: None,
                        border_color: "#dc2626".to_string(),
                        background_color: "rgba(220, 38, 38, 0.2)".to_string(),
                    },
                ),
                (
                    "default".to_string(),
                    PaletteEntryConfig {
                        label: Some("Other".to_string()),
                        border_color: "#000000".to_string(),
                        background_color: "rgba(0, 0, 0, 0.2)".to_string(),
                    },
                ),
            ]),
        };
        let palette = ChartPalette::from_config(&config);

        let hot = palette.descriptor("hot");
        assert_eq!(hot.label, "Hot Water");
        assert_eq!(hot.border_color, "#dc2626");
        assert_eq!(palette.descriptor("gas").label, "Other");
    }

    #[test]
    fn serializes_to_chart_js_shape() {
        let grouped = group_by_period(
            &apartment(4, vec![counter(1, "cold", vec![reading(1, 58.2, date!(2025-04-10))])]),
            Granularity::Day,
        );
        let json = serde_json::to_value(ChartProjector::default().readings_chart(&grouped)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "labels": ["Apr"],
                "datasets": [{
                    "label": "Cold Water",
                    "data": [58.2],
                    "borderColor": "#3b82f6",
                    "backgroundColor": "rgba(59, 130, 246, 0.2)",
                    "tension": 0.3
                }]
            })
        );
    }

    #[test]
    fn shared_medium_datasets_are_told_apart() {
        let apt = apartment(
            4,
            vec![
                counter(7, "cold", vec![reading(7, 1.0, date!(2025-01-10))]),
                counter(8, "cold", vec![reading(8, 2.0, date!(2025-01-10))]),
            ],
        );
        let chart = ChartProjector::default().readings_chart(&group_by_period(&apt, Granularity::Day));
        let labels: Vec<&str> = chart.datasets.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["Cold Water #7", "Cold Water #8"]);
    }
}
