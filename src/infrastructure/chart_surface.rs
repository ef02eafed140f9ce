//! Chart surfaces shipped with the monitor
//!
//! `MemoryChartSurface` records every series so the CLI can export the loss
//! history and tests can inspect exactly what was appended.
//! `ConsoleChartSurface` wraps one and reports appends through `tracing`.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::application::report::SeriesHistory;
use crate::domain::services::{ChartSurface, SeriesHandle};

#[derive(Debug, Default)]
struct SeriesGroup {
    names: Vec<String>,
    points: Vec<Vec<(f64, f64)>>,
    value: Option<f64>,
    autoscale_count: usize,
}

/// In-memory chart surface. Clones share the same recorded data.
#[derive(Debug, Clone, Default)]
pub struct MemoryChartSurface {
    groups: Arc<Mutex<Vec<SeriesGroup>>>,
}

impl MemoryChartSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_groups<R>(&self, f: impl FnOnce(&mut Vec<SeriesGroup>) -> R) -> R {
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut groups)
    }

    fn find<R>(&self, name: &str, f: impl Fn(&SeriesGroup, usize) -> R) -> Option<R> {
        self.with_groups(|groups| {
            groups.iter().find_map(|group| {
                group
                    .names
                    .iter()
                    .position(|n| n == name)
                    .map(|index| f(group, index))
            })
        })
    }

    /// All points of the named series, in append order
    pub fn series_points(&self, name: &str) -> Vec<(f64, f64)> {
        self.find(name, |group, index| group.points[index].clone())
            .unwrap_or_default()
    }

    /// Just the x values (epochs) of the named series
    pub fn series_epochs(&self, name: &str) -> Vec<f64> {
        self.series_points(name).into_iter().map(|(x, _)| x).collect()
    }

    /// Current gauge value of the group containing `name`
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        self.find(name, |group, _| group.value).flatten()
    }

    /// How many times the group containing `name` was autoscaled
    pub fn autoscale_count(&self, name: &str) -> usize {
        self.find(name, |group, _| group.autoscale_count).unwrap_or(0)
    }

    /// Every non-empty series, for export
    pub fn history(&self) -> Vec<SeriesHistory> {
        self.with_groups(|groups| {
            groups
                .iter()
                .flat_map(|group| group.names.iter().zip(group.points.iter()))
                .filter(|(_, points)| !points.is_empty())
                .map(|(name, points)| SeriesHistory {
                    name: name.clone(),
                    points: points.clone(),
                })
                .collect()
        })
    }
}

impl ChartSurface for MemoryChartSurface {
    fn create_series(&mut self, names: &[&str]) -> SeriesHandle {
        self.with_groups(|groups| {
            groups.push(SeriesGroup {
                names: names.iter().map(|n| (*n).to_string()).collect(),
                points: vec![Vec::new(); names.len()],
                value: None,
                autoscale_count: 0,
            });
            SeriesHandle(groups.len() - 1)
        })
    }

    fn append_point(&mut self, handle: SeriesHandle, series_index: usize, x: f64, y: f64) {
        self.with_groups(|groups| {
            match groups.get_mut(handle.0).and_then(|g| g.points.get_mut(series_index)) {
                Some(series) => series.push((x, y)),
                None => debug!("append_point on unknown series {:?}[{}]", handle, series_index),
            }
        });
    }

    fn set_value(&mut self, handle: SeriesHandle, y: f64) {
        self.with_groups(|groups| {
            if let Some(group) = groups.get_mut(handle.0) {
                group.value = Some(y);
            }
        });
    }

    fn autoscale(&mut self, handle: SeriesHandle) {
        self.with_groups(|groups| {
            if let Some(group) = groups.get_mut(handle.0) {
                group.autoscale_count += 1;
            }
        });
    }
}

/// Logs chart activity while recording it in an inner memory surface
#[derive(Debug, Clone, Default)]
pub struct ConsoleChartSurface {
    inner: MemoryChartSurface,
    names: Vec<Vec<String>>,
}

impl ConsoleChartSurface {
    pub fn new(inner: MemoryChartSurface) -> Self {
        Self {
            inner,
            names: Vec::new(),
        }
    }

    pub fn recorder(&self) -> &MemoryChartSurface {
        &self.inner
    }

    fn series_name(&self, handle: SeriesHandle, series_index: usize) -> &str {
        self.names
            .get(handle.0)
            .and_then(|names| names.get(series_index))
            .map_or("?", String::as_str)
    }
}

impl ChartSurface for ConsoleChartSurface {
    fn create_series(&mut self, names: &[&str]) -> SeriesHandle {
        let handle = self.inner.create_series(names);
        self.names
            .push(names.iter().map(|n| (*n).to_string()).collect());
        handle
    }

    fn append_point(&mut self, handle: SeriesHandle, series_index: usize, x: f64, y: f64) {
        info!("📈 {:<16} epoch {:>6} -> {:.6e}", self.series_name(handle, series_index), x, y);
        self.inner.append_point(handle, series_index, x, y);
    }

    fn set_value(&mut self, handle: SeriesHandle, y: f64) {
        debug!("{} = {:.0}", self.series_name(handle, 0), y);
        self.inner.set_value(handle, y);
    }

    fn autoscale(&mut self, handle: SeriesHandle) {
        self.inner.autoscale(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_surface_records_groups() {
        let mut surface = MemoryChartSurface::new();
        let losses = surface.create_series(&["Total Loss", "Physics Loss"]);
        let gauge = surface.create_series(&["Training Progress"]);

        surface.append_point(losses, 0, 1.0, 0.5);
        surface.append_point(losses, 1, 1.0, 0.2);
        surface.append_point(losses, 7, 1.0, 0.2);
        surface.autoscale(losses);
        surface.set_value(gauge, 42.0);

        assert_eq!(surface.series_points("Total Loss"), vec![(1.0, 0.5)]);
        assert_eq!(surface.series_epochs("Physics Loss"), vec![1.0]);
        assert_eq!(surface.gauge_value("Training Progress"), Some(42.0));
        assert_eq!(surface.autoscale_count("Physics Loss"), 1);
        assert!(surface.series_points("Unknown").is_empty());
    }

    #[test]
    fn test_history_skips_empty_series() {
        let mut surface = MemoryChartSurface::new();
        let losses = surface.create_series(&["Total Loss", "Physics Loss"]);
        surface.append_point(losses, 0, 3.0, 0.1);

        let history = surface.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "Total Loss");
    }

    #[test]
    fn test_console_surface_shares_recording() {
        let recorder = MemoryChartSurface::new();
        let mut console = ConsoleChartSurface::new(recorder.clone());
        let handle = console.create_series(&["Convergence Rate"]);
        console.append_point(handle, 0, 5.0, 0.9);

        assert_eq!(recorder.series_points("Convergence Rate"), vec![(5.0, 0.9)]);
        assert_eq!(console.recorder().series_epochs("Convergence Rate"), vec![5.0]);
    }
}
