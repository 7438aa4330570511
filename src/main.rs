use anyhow::{Context, Result, bail};
use clap::Parser;
use nalgebra::{Point2, Vector2};
use perspective_paste::editor::Editor;
use perspective_paste::read_state::{load, points_file_for, save_image};
use perspective_paste::render::flatten;
use perspective_paste::settings::EditorSettings;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Pastes a marked quadrilateral of an image back onto itself, re-warped
/// to keep the scene's two-point perspective.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long)]
    image: String,
    /// Marks file, `<image stem>.points` beside the image by default.
    #[arg(short, long)]
    points: Option<String>,
    #[arg(short, long)]
    output: String,
    #[arg(short, long)]
    settings: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();
    let settings = match &args.settings {
        Some(path) => EditorSettings::read_from_file(path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => EditorSettings::default(),
    };
    let points = match args.points {
        Some(points) => points,
        None => points_file_for(&args.image).context("image path has no file name")?,
    };

    let (image, marks) = load(args.image.clone(), points.clone()).await?;
    let Some(marks) = marks else {
        bail!("no marks found in {points}");
    };
    let (width, height) = image.dimensions();

    let mut editor = Editor::new(settings);
    let background = editor.add_layer("background");
    editor.set_layer_image(background, image)?;
    for corner in marks.corner_points() {
        if !editor.append_control_point(background, corner)? {
            warn!("ignoring extra mark {corner:?}");
        }
    }

    let vanishing_points = editor.compute_vanishing_points(background)?;
    info!(
        "vp1 {:?}, vp2 {:?}",
        vanishing_points.vp1, vanishing_points.vp2
    );

    let pasted = editor.paste_selection(background)?;
    if let Some(translate) = marks.translate {
        editor
            .layer_mut(pasted)?
            .translate(Vector2::new(translate.x, translate.y));
    }
    for drag in marks.drags.iter().flatten() {
        editor.drag_corner(pasted, drag.corner, Point2::from(drag.to))?;
    }

    let canvas = flatten(&editor.render(), width, height);
    save_image(&canvas, &args.output).await?;
    info!("wrote {}", args.output);
    Ok(())
}
