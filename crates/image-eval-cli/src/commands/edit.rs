//! Edit command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use image_eval::decode::{load_buffer, save_buffer};
use image_eval::{EditPipeline, Transform};
use tracing::info;

pub fn run(input: PathBuf, output: PathBuf, ops: Vec<Transform>) -> Result<()> {
    let buffer =
        load_buffer(&input).with_context(|| format!("Failed to load: {}", input.display()))?;
    let pipeline: EditPipeline = ops.into_iter().collect();

    let edited = pipeline.apply(&buffer).context("Edit failed")?;
    save_buffer(&edited, &output)
        .with_context(|| format!("Failed to save: {}", output.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        transforms = pipeline.transforms().len(),
        shape = %edited.shape(),
        "edited image"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_eval::{PixelBuffer, Precision};

    #[test]
    fn test_edit_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        let original = PixelBuffer::from_fn(40, 30, 3, Precision::U8, |x, y, c| {
            ((x * 5 + y * 3 + c * 40) % 200) as f32 + 20.0
        })
        .unwrap();
        save_buffer(&original, &input).unwrap();

        let ops: Vec<Transform> = ["gray", "crop=0,0,20,10"]
            .iter()
            .map(|op| op.parse().unwrap())
            .collect();
        run(input, output.clone(), ops.clone()).unwrap();

        let edited = load_buffer(&output).unwrap();
        assert_eq!((edited.width(), edited.height(), edited.channels()), (20, 10, 3));
        let px = edited.pixel(3, 4).unwrap();
        assert!(px[0] == px[1] && px[1] == px[2], "not gray: {px:?}");

        let expected = ops.into_iter().collect::<EditPipeline>().apply(&original).unwrap();
        assert_eq!(edited.samples(), expected.samples());
    }

    #[test]
    fn test_edit_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            dir.path().join("missing.png"),
            dir.path().join("out.png"),
            vec![Transform::Sharpen],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to load"), "{err}");
        assert!(!dir.path().join("out.png").exists());
    }
}
