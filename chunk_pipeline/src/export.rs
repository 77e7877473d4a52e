//! Plain-text label export.
//!
//! Restored scenes are written in the benchmark submission layout: one
//! file per scene, one label id per line, line `i` holding the label of
//! scene point `i`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::aggregate::{ChunkPrediction, PredictionAggregator, RestoredScene};
use crate::error::{PipelineError, Result};

/// Writes one label id per line.
pub fn write_labels<W: Write>(restored: &RestoredScene, writer: &mut W) -> Result<()> {
    for label in &restored.labels {
        writeln!(writer, "{}", label)?;
    }
    Ok(())
}

/// Writes a restored scene to `<dir>/<scene>.txt`.
///
/// The directory is created if needed. An existing file is never
/// overwritten; results from an earlier run have to be moved away first.
pub fn export_scene(dir: &Path, restored: &RestoredScene) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.txt", restored.scene));

    let file = File::create_new(&path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            PipelineError::ExportExists { path: path.clone() }
        } else {
            PipelineError::from(err)
        }
    })?;
    let mut writer = BufWriter::new(file);
    write_labels(restored, &mut writer)?;
    writer.flush()?;

    log::info!(
        "exported {} labels to {}",
        restored.labels.len(),
        path.display()
    );
    Ok(path)
}

/// Drains a prediction stream through `aggregator`, exporting every scene
/// it completes. Returns the number of scenes written.
pub fn export_predictions<I>(
    predictions: I,
    aggregator: &mut PredictionAggregator,
    dir: &Path,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<ChunkPrediction>>,
{
    let mut exported = 0usize;
    for prediction in predictions {
        if let Some(restored) = aggregator.push(prediction?)? {
            export_scene(dir, &restored)?;
            exported += 1;
        }
    }
    if let Some(restored) = aggregator.finish()? {
        export_scene(dir, &restored)?;
        exported += 1;
    }

    log::info!("exported {} scenes to {}", exported, dir.display());
    Ok(exported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AggregatorConfig;
    use tempfile::TempDir;

    fn restored(scene: &str, labels: Vec<i32>) -> RestoredScene {
        RestoredScene {
            scene: scene.to_string(),
            labels,
        }
    }

    #[test]
    fn test_write_labels_one_per_line() {
        let mut buffer = Vec::new();
        write_labels(&restored("s", vec![1, 14, 39]), &mut buffer).unwrap();
        assert_eq!(buffer, b"1\n14\n39\n");
    }

    #[test]
    fn test_export_scene_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let scene = restored("room_00", vec![2, 2, 5]);

        let path = export_scene(dir.path(), &scene).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2\n2\n5\n");

        let result = export_scene(dir.path(), &scene);
        assert!(matches!(result, Err(PipelineError::ExportExists { .. })));
        // The original file is untouched.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2\n2\n5\n");
    }

    #[test]
    fn test_export_predictions_writes_every_scene() {
        let dir = TempDir::new().unwrap();
        let predictions = vec![
            ChunkPrediction::new("a", vec![1, 2], vec![0, 1], vec![true, true]),
            ChunkPrediction::new("a", vec![3], vec![2], vec![true]),
            ChunkPrediction::new("b", vec![7], vec![0], vec![true]),
        ];

        let mut agg = PredictionAggregator::new(AggregatorConfig::new());
        let exported = export_predictions(predictions, &mut agg, dir.path()).unwrap();
        assert_eq!(exported, 2);

        let a = std::fs::read_to_string(dir.path().join("a.txt")).unwrap();
        assert_eq!(a, "1\n2\n3\n");
        let b = std::fs::read_to_string(dir.path().join("b.txt")).unwrap();
        assert_eq!(b, "7\n");
    }
}
