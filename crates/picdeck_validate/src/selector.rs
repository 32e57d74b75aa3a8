//! Series extraction from a result store.
//!
//! A selector names one diagnostic output and narrows it down to a numeric
//! array: which timesteps, which named array in each frame, which grid axes
//! to sum or index, and for tracked particles which particles to follow.

use ndarray::{Array1, ArrayD, ArrayView1, Axis, Ix1};
use picdeck_core::{DiagnosticKind, OutputKey, ParticleFilter};
use picdeck_storage::{DiagnosticRecord, Frame, ResultStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, ValidationError};

/// Column identifying tracked particles across timesteps
const PARTICLE_ID: &str = "id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timesteps {
    #[default]
    All,
    At(u64),
    /// Inclusive on both ends
    Range { start: u64, end: u64 },
    List(Vec<u64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceOp {
    /// Sum over the whole axis
    All,
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSlice {
    pub axis: String,
    pub op: SliceOp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesOutput {
    #[default]
    Values,
    /// The selected timesteps themselves
    Timesteps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSelector {
    pub kind: DiagnosticKind,
    /// Required when the store holds several diagnostics of `kind`
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub timesteps: Timesteps,
    /// Array name inside each frame; optional when frames hold one array
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub slice: Vec<AxisSlice>,
    /// Tracked-particle selection
    #[serde(default)]
    pub filter: Option<ParticleFilter>,
    /// Timestep the filter is evaluated at (first selected timestep if absent)
    #[serde(default)]
    pub filter_at: Option<u64>,
    #[serde(default)]
    pub output: SeriesOutput,
}

impl SeriesSelector {
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            kind,
            index: None,
            timesteps: Timesteps::All,
            quantity: None,
            slice: Vec::new(),
            filter: None,
            filter_at: None,
            output: SeriesOutput::Values,
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    pub fn at(mut self, timestep: u64) -> Self {
        self.timesteps = Timesteps::At(timestep);
        self
    }

    pub fn with_timesteps(mut self, timesteps: Timesteps) -> Self {
        self.timesteps = timesteps;
        self
    }

    pub fn with_quantity(mut self, quantity: &str) -> Self {
        self.quantity = Some(quantity.to_string());
        self
    }

    pub fn sum_over(mut self, axis: &str) -> Self {
        self.slice.push(AxisSlice {
            axis: axis.to_string(),
            op: SliceOp::All,
        });
        self
    }

    pub fn take(mut self, axis: &str, index: usize) -> Self {
        self.slice.push(AxisSlice {
            axis: axis.to_string(),
            op: SliceOp::Index(index),
        });
        self
    }

    pub fn with_filter(mut self, filter: ParticleFilter, at: Option<u64>) -> Self {
        self.filter = Some(filter);
        self.filter_at = at;
        self
    }

    pub fn available_timesteps(mut self) -> Self {
        self.output = SeriesOutput::Timesteps;
        self
    }
}

/// Open a finished run's results read-only
pub fn open_result_store(path: &Path) -> Result<ResultStore> {
    ResultStore::open(path).map_err(|e| match e {
        StoreError::Incomplete(file) => ValidationError::ResultStoreIncomplete(file),
        other => ValidationError::ResultStoreNotFound {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    })
}

/// Extract the series `selector` names.
///
/// One selected timestep gives the frame's shape; several are stacked along
/// a new leading axis.
pub fn extract_series(store: &ResultStore, selector: &SeriesSelector) -> Result<ArrayD<f64>> {
    let record = resolve_record(store, selector)?;
    let steps = select_timesteps(record, &selector.timesteps)?;
    debug!(key = %record.key, steps = steps.len(), "extracting series");

    if selector.output == SeriesOutput::Timesteps {
        let steps: Array1<f64> = steps.iter().map(|&t| t as f64).collect();
        return Ok(steps.into_dyn());
    }

    let arrays = match &selector.filter {
        Some(filter) => tracked_series(record, selector, filter, &steps)?,
        None => steps
            .iter()
            .map(|&t| {
                let frame = frame_at(record, t)?;
                let array = frame_array(record, frame, selector.quantity.as_deref())?;
                apply_slices(record, array.clone(), &selector.slice)
            })
            .collect::<Result<Vec<_>>>()?,
    };
    stack(arrays)
}

fn resolve_record<'a>(
    store: &'a ResultStore,
    selector: &SeriesSelector,
) -> Result<&'a DiagnosticRecord> {
    if let Some(index) = selector.index {
        let key = OutputKey {
            kind: selector.kind,
            index,
        };
        return store
            .record(key)
            .ok_or_else(|| ValidationError::SeriesNotFound(format!("no {key} output")));
    }

    let candidates = store.records_of_kind(selector.kind);
    match candidates.as_slice() {
        [] => Err(ValidationError::SeriesNotFound(format!(
            "no {} output",
            selector.kind
        ))),
        [only] => Ok(*only),
        _ => Err(ValidationError::AmbiguousSelector {
            kind: selector.kind,
            count: candidates.len(),
        }),
    }
}

fn select_timesteps(record: &DiagnosticRecord, timesteps: &Timesteps) -> Result<Vec<u64>> {
    let steps = match timesteps {
        Timesteps::All => record.timesteps(),
        Timesteps::At(t) => vec![*t],
        Timesteps::Range { start, end } => {
            if start > end {
                return Err(ValidationError::InvalidSelector(format!(
                    "timestep range {start}..={end} is empty"
                )));
            }
            record.frames.range(*start..=*end).map(|(t, _)| *t).collect()
        }
        Timesteps::List(list) => list.clone(),
    };

    if let Some(missing) = steps.iter().find(|t| !record.frames.contains_key(*t)) {
        return Err(ValidationError::SeriesNotFound(format!(
            "{} has no output at timestep {missing}",
            record.key
        )));
    }
    if steps.is_empty() {
        return Err(ValidationError::SeriesNotFound(format!(
            "{} has no output in the selected timesteps",
            record.key
        )));
    }
    Ok(steps)
}

fn frame_at(record: &DiagnosticRecord, timestep: u64) -> Result<&Frame> {
    record.frames.get(&timestep).ok_or_else(|| {
        ValidationError::SeriesNotFound(format!(
            "{} has no output at timestep {timestep}",
            record.key
        ))
    })
}

fn frame_array<'a>(
    record: &DiagnosticRecord,
    frame: &'a Frame,
    quantity: Option<&str>,
) -> Result<&'a ArrayD<f64>> {
    match quantity {
        Some(name) => frame.get(name).ok_or_else(|| {
            ValidationError::SeriesNotFound(format!("{} has no quantity '{name}'", record.key))
        }),
        None => frame.single().map(|(_, array)| array).ok_or_else(|| {
            let names: Vec<&str> = frame.arrays.keys().map(String::as_str).collect();
            ValidationError::SeriesNotFound(format!(
                "{} holds {names:?}; name a quantity",
                record.key
            ))
        }),
    }
}

fn apply_slices(
    record: &DiagnosticRecord,
    mut array: ArrayD<f64>,
    slices: &[AxisSlice],
) -> Result<ArrayD<f64>> {
    let mut positioned = Vec::with_capacity(slices.len());
    for slice in slices {
        let position = record.axis_position(&slice.axis).ok_or_else(|| {
            ValidationError::InvalidSelector(format!(
                "{} has no axis '{}' (axes: {:?})",
                record.key, slice.axis, record.axes
            ))
        })?;
        if positioned.iter().any(|(p, _)| *p == position) {
            return Err(ValidationError::InvalidSelector(format!(
                "axis '{}' sliced twice",
                slice.axis
            )));
        }
        positioned.push((position, slice.op));
    }

    // Highest axis first so lower positions stay valid
    positioned.sort_by(|a, b| b.0.cmp(&a.0));
    for (position, op) in positioned {
        if position >= array.ndim() {
            return Err(ValidationError::InvalidSelector(format!(
                "{} frame has {} axes, cannot slice axis {position}",
                record.key,
                array.ndim()
            )));
        }
        let axis = Axis(position);
        array = match op {
            SliceOp::All => array.sum_axis(axis),
            SliceOp::Index(i) => {
                let len = array.len_of(axis);
                if i >= len {
                    return Err(ValidationError::SeriesNotFound(format!(
                        "index {i} outside axis '{}' of length {len}",
                        record.axes[position]
                    )));
                }
                array.index_axis(axis, i).to_owned()
            }
        };
    }
    Ok(array)
}

fn column<'a>(record: &DiagnosticRecord, frame: &'a Frame, name: &str) -> Result<ArrayView1<'a, f64>> {
    let array = frame.get(name).ok_or_else(|| {
        ValidationError::SeriesNotFound(format!("{} does not track '{name}'", record.key))
    })?;
    array.view().into_dimensionality::<Ix1>().map_err(|_| {
        ValidationError::InvalidSelector(format!(
            "{} column '{name}' is not one-dimensional",
            record.key
        ))
    })
}

/// Follow the particles matching `filter` at the filter timestep through
/// every selected timestep. Particles are matched by `id` when the store
/// carries one, by position otherwise; a particle absent at a timestep
/// yields NaN.
fn tracked_series(
    record: &DiagnosticRecord,
    selector: &SeriesSelector,
    filter: &ParticleFilter,
    steps: &[u64],
) -> Result<Vec<ArrayD<f64>>> {
    if selector.kind != DiagnosticKind::TrackParticles {
        return Err(ValidationError::InvalidSelector(format!(
            "filters only apply to {} output",
            DiagnosticKind::TrackParticles
        )));
    }
    let quantity = selector.quantity.as_deref().ok_or_else(|| {
        ValidationError::InvalidSelector("tracked particle selection needs a quantity".into())
    })?;

    let filter_step = selector.filter_at.unwrap_or(steps[0]);
    let frame = frame_at(record, filter_step)?;
    let columns = filter
        .quantities()
        .map(|q| -> Result<_> { Ok((q, column(record, frame, q.as_str())?)) })
        .collect::<Result<HashMap<_, _>>>()?;
    let id = match frame.get(PARTICLE_ID) {
        Some(_) => Some(column(record, frame, PARTICLE_ID)?),
        None => None,
    };
    let lengths: Vec<usize> = columns.values().chain(id.iter()).map(|c| c.len()).collect();
    let count = lengths.first().copied().unwrap_or(0);
    if lengths.iter().any(|&len| len != count) {
        return Err(ValidationError::InvalidSelector(format!(
            "{} columns at timestep {filter_step} differ in length: {lengths:?}",
            record.key
        )));
    }

    let selected: Vec<usize> = (0..count)
        .filter(|&i| filter.matches(|q| columns.get(&q).map(|c| c[i])) == Some(true))
        .collect();
    let ids: Option<Vec<f64>> = id.map(|id| selected.iter().map(|&i| id[i]).collect());
    debug!(
        key = %record.key,
        filter = %filter,
        at = filter_step,
        selected = selected.len(),
        "particles selected"
    );

    steps
        .iter()
        .map(|&t| -> Result<ArrayD<f64>> {
            let frame = frame_at(record, t)?;
            let values = column(record, frame, quantity)?;
            let picked: Array1<f64> = match &ids {
                Some(ids) => {
                    let id_column = column(record, frame, PARTICLE_ID)?;
                    let position: HashMap<u64, usize> = id_column
                        .iter()
                        .enumerate()
                        .map(|(i, id)| (id.to_bits(), i))
                        .collect();
                    ids.iter()
                        .map(|id| {
                            position
                                .get(&id.to_bits())
                                .and_then(|&i| values.get(i).copied())
                                .unwrap_or(f64::NAN)
                        })
                        .collect()
                }
                None => selected
                    .iter()
                    .map(|&i| values.get(i).copied().unwrap_or(f64::NAN))
                    .collect(),
            };
            Ok(picked.into_dyn())
        })
        .collect()
}

fn stack(mut arrays: Vec<ArrayD<f64>>) -> Result<ArrayD<f64>> {
    if arrays.len() == 1 {
        return Ok(arrays.remove(0));
    }
    let expected = arrays[0].shape().to_vec();
    if let Some(odd) = arrays.iter().find(|a| a.shape() != expected.as_slice()) {
        return Err(ValidationError::ShapeMismatch {
            expected,
            actual: odd.shape().to_vec(),
        });
    }
    let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| ValidationError::InvalidSelector(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn, arr1, arr2};
    use picdeck_storage::ResultArchive;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn key(kind: DiagnosticKind, index: u32) -> OutputKey {
        OutputKey { kind, index }
    }

    fn store(archive: ResultArchive) -> ResultStore {
        ResultStore::from_archive(PathBuf::from("memory"), archive)
    }

    fn binning_store() -> ResultStore {
        let mut archive = ResultArchive::new(Uuid::new_v4());
        let binning = key(DiagnosticKind::ParticleBinning, 0);
        archive.record_mut(binning, &["x", "px"]);
        for t in [0, 100, 200] {
            let grid = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]) * (1.0 + t as f64);
            archive.push_array(binning, t, "weight_px", grid.into_dyn());
        }
        store(archive)
    }

    fn track_store() -> ResultStore {
        let mut archive = ResultArchive::new(Uuid::new_v4());
        let track = key(DiagnosticKind::TrackParticles, 0);
        // particle 7 leaves the box after step 0
        archive.push_array(track, 0, "id", arr1(&[5.0, 6.0, 7.0]).into_dyn());
        archive.push_array(track, 0, "x", arr1(&[0.01, 0.5, 0.015]).into_dyn());
        archive.push_array(track, 0, "px", arr1(&[0.1, 0.2, 0.3]).into_dyn());
        archive.push_array(track, 10, "id", arr1(&[6.0, 5.0]).into_dyn());
        archive.push_array(track, 10, "x", arr1(&[0.6, 0.03]).into_dyn());
        archive.push_array(track, 10, "px", arr1(&[0.25, 0.15]).into_dyn());
        store(archive)
    }

    #[test]
    fn single_timestep_keeps_frame_shape() {
        let series = extract_series(
            &binning_store(),
            &SeriesSelector::new(DiagnosticKind::ParticleBinning).at(0),
        )
        .unwrap();
        assert_eq!(series.shape(), &[2, 3]);
    }

    #[test]
    fn several_timesteps_stack_on_leading_axis() {
        let series = extract_series(
            &binning_store(),
            &SeriesSelector::new(DiagnosticKind::ParticleBinning).sum_over("px"),
        )
        .unwrap();
        assert_eq!(series.shape(), &[3, 2]);
        assert_eq!(series[[0, 0]], 6.0);
        assert_eq!(series[[2, 1]], 15.0 * 201.0);
    }

    #[test]
    fn slices_sum_and_index() {
        let series = extract_series(
            &binning_store(),
            &SeriesSelector::new(DiagnosticKind::ParticleBinning)
                .with_timesteps(Timesteps::Range { start: 50, end: 200 })
                .take("x", 1)
                .sum_over("px"),
        )
        .unwrap();
        assert_eq!(series, arr1(&[15.0 * 101.0, 15.0 * 201.0]).into_dyn());
    }

    #[test]
    fn available_timesteps() {
        let series = extract_series(
            &binning_store(),
            &SeriesSelector::new(DiagnosticKind::ParticleBinning).available_timesteps(),
        )
        .unwrap();
        assert_eq!(series, arr1(&[0.0, 100.0, 200.0]).into_dyn());
    }

    #[test]
    fn two_diagnostics_of_a_kind_need_an_index() {
        let mut archive = ResultArchive::new(Uuid::new_v4());
        for index in 0..2 {
            archive.push_array(
                key(DiagnosticKind::ParticleBinning, index),
                0,
                "weight",
                arr1(&[1.0]).into_dyn(),
            );
        }
        let store = store(archive);
        let selector = SeriesSelector::new(DiagnosticKind::ParticleBinning);

        assert!(matches!(
            extract_series(&store, &selector),
            Err(ValidationError::AmbiguousSelector { count: 2, .. })
        ));
        assert!(extract_series(&store, &selector.with_index(1)).is_ok());
    }

    #[test]
    fn missing_pieces_are_series_not_found() {
        let store = binning_store();
        let cases = [
            SeriesSelector::new(DiagnosticKind::Scalar),
            SeriesSelector::new(DiagnosticKind::ParticleBinning).with_index(3),
            SeriesSelector::new(DiagnosticKind::ParticleBinning).at(150),
            SeriesSelector::new(DiagnosticKind::ParticleBinning).with_quantity("weight"),
            SeriesSelector::new(DiagnosticKind::ParticleBinning).take("x", 9),
        ];
        for selector in cases {
            assert!(
                matches!(
                    extract_series(&store, &selector),
                    Err(ValidationError::SeriesNotFound(_))
                ),
                "{selector:?}"
            );
        }
    }

    #[test]
    fn unknown_axis_is_invalid() {
        let selector = SeriesSelector::new(DiagnosticKind::ParticleBinning).sum_over("y");
        assert!(matches!(
            extract_series(&binning_store(), &selector),
            Err(ValidationError::InvalidSelector(_))
        ));
    }

    #[test]
    fn filter_follows_particles_by_id() {
        let selector = SeriesSelector::new(DiagnosticKind::TrackParticles)
            .with_quantity("px")
            .with_filter("x < 0.02".parse().unwrap(), None);
        let series = extract_series(&track_store(), &selector).unwrap();

        assert_eq!(series.shape(), &[2, 2]);
        assert_eq!(series[[0, 0]], 0.1);
        assert_eq!(series[[0, 1]], 0.3);
        assert_eq!(series[[1, 0]], 0.15);
        assert!(series[[1, 1]].is_nan());
    }

    #[test]
    fn filter_evaluated_at_given_timestep() {
        let selector = SeriesSelector::new(DiagnosticKind::TrackParticles)
            .with_quantity("x")
            .at(0)
            .with_filter("x > 0.5".parse().unwrap(), Some(10));
        let series = extract_series(&track_store(), &selector).unwrap();
        assert_eq!(series, arr1(&[0.5]).into_dyn());
    }

    #[test]
    fn positional_tracking_without_ids() {
        let mut archive = ResultArchive::new(Uuid::new_v4());
        let track = key(DiagnosticKind::TrackParticles, 0);
        archive.push_array(track, 0, "x", arr1(&[0.0, 1.0, 2.0]).into_dyn());
        archive.push_array(track, 1, "x", arr1(&[0.5, 1.5]).into_dyn());
        let selector = SeriesSelector::new(DiagnosticKind::TrackParticles)
            .with_quantity("x")
            .with_filter("x >= 1".parse().unwrap(), None);

        let series = extract_series(&store(archive), &selector).unwrap();
        assert_eq!(series[[1, 0]], 1.5);
        assert!(series[[1, 1]].is_nan());
    }

    #[test]
    fn ragged_particle_columns_are_rejected() {
        let mut archive = ResultArchive::new(Uuid::new_v4());
        let track = key(DiagnosticKind::TrackParticles, 0);
        archive.push_array(track, 0, "x", arr1(&[0.0, 1.0, 2.0]).into_dyn());
        archive.push_array(track, 0, "px", arr1(&[0.5, 1.5]).into_dyn());
        let store = store(archive);

        let both = SeriesSelector::new(DiagnosticKind::TrackParticles)
            .with_quantity("x")
            .with_filter("x >= 0 && px > 0".parse().unwrap(), None);
        assert!(matches!(
            extract_series(&store, &both),
            Err(ValidationError::InvalidSelector(_))
        ));
    }

    #[test]
    fn id_column_must_match_filter_columns() {
        let mut archive = ResultArchive::new(Uuid::new_v4());
        let track = key(DiagnosticKind::TrackParticles, 0);
        archive.push_array(track, 0, "id", arr1(&[1.0]).into_dyn());
        archive.push_array(track, 0, "x", arr1(&[0.0, 1.0]).into_dyn());
        let selector = SeriesSelector::new(DiagnosticKind::TrackParticles)
            .with_quantity("x")
            .with_filter("x >= 0".parse().unwrap(), None);
        assert!(matches!(
            extract_series(&store(archive), &selector),
            Err(ValidationError::InvalidSelector(_))
        ));
    }

    #[test]
    fn scalars_stack_into_a_time_series() {
        let mut archive = ResultArchive::new(Uuid::new_v4());
        let scalar = key(DiagnosticKind::Scalar, 0);
        for t in 0..4 {
            archive.push_array(scalar, t, "Utot", ArrayD::from_elem(IxDyn(&[]), t as f64));
        }
        let series = extract_series(
            &store(archive),
            &SeriesSelector::new(DiagnosticKind::Scalar).with_quantity("Utot"),
        )
        .unwrap();
        assert_eq!(series, arr1(&[0.0, 1.0, 2.0, 3.0]).into_dyn());
    }

    #[test]
    fn selectors_load_from_json() {
        let selector: SeriesSelector = serde_json::from_str(
            r#"{"kind": "track-particles", "quantity": "px", "timesteps": {"at": 10},
                "filter": "x < 0.02", "slice": [{"axis": "x", "op": "all"}]}"#,
        )
        .unwrap();
        assert_eq!(selector.timesteps, Timesteps::At(10));
        assert_eq!(selector.slice[0].op, SliceOp::All);
        assert_eq!(selector.filter.unwrap().to_string(), "x < 0.02");
    }
}
