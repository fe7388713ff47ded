//! Staff preview rendering
//!
//! A deliberately simple picture of the melody: five staff lines, one column
//! per note (symbolic spacing, not time-proportional) and a note head placed
//! by natural letter only. Sharps sit on their natural letter's position and
//! are told apart only by their text label.

use crate::config::SheetConfig;
use crate::error::{Result, WhistleError};
use crate::note::Note;
use log::warn;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

/// Vertical staff position of a natural note letter
pub fn staff_position(letter: char) -> Option<f64> {
    match letter {
        'C' => Some(0.0),
        'D' => Some(0.5),
        'E' => Some(1.0),
        'F' => Some(1.5),
        'G' => Some(2.0),
        'A' => Some(2.5),
        'B' => Some(3.0),
        _ => None,
    }
}

/// A note head to draw
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub x: f64,
    pub y: f64,
    pub label: String,
}

/// Renderer-independent description of the preview
#[derive(Debug, Clone, PartialEq)]
pub struct StaffLayout {
    /// One column per input note, drawn or not
    pub columns: usize,
    pub glyphs: Vec<Glyph>,
}

impl StaffLayout {
    pub const STAFF_LINES: [f64; 5] = [0.0, 1.0, 2.0, 3.0, 4.0];

    pub fn x_range(&self) -> std::ops::Range<f64> {
        -0.5..(self.columns as f64 + 0.5)
    }

    pub fn y_range(&self) -> std::ops::Range<f64> {
        -0.5..4.5
    }
}

/// Place each note in its own column
pub fn layout_staff(notes: &[Note]) -> StaffLayout {
    let glyphs = notes
        .iter()
        .enumerate()
        .filter_map(|(column, note)| {
            let y = staff_position(note.note_name.pitch_class.letter())?;
            Some(Glyph {
                x: column as f64,
                y,
                label: note.note_name.to_string(),
            })
        })
        .collect();

    StaffLayout {
        columns: notes.len(),
        glyphs,
    }
}

fn render_error<E: std::fmt::Debug>(what: &str) -> impl FnOnce(E) -> WhistleError + '_ {
    move |e| WhistleError::SheetRender(format!("Failed to {}: {:?}", what, e))
}

/// Draw the layout into a PNG file
pub fn render_png_file(layout: &StaffLayout, config: &SheetConfig, path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_error("fill background"))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(40)
        .build_cartesian_2d(layout.x_range(), layout.y_range())
        .map_err(render_error("build chart"))?;

    let x_range = layout.x_range();
    chart
        .draw_series(StaffLayout::STAFF_LINES.iter().map(|&y| {
            PathElement::new(vec![(x_range.start, y), (x_range.end, y)], BLACK.stroke_width(1))
        }))
        .map_err(render_error("draw staff lines"))?;

    chart
        .draw_series(
            layout
                .glyphs
                .iter()
                .map(|g| Circle::new((g.x, g.y), config.note_radius, BLACK.filled())),
        )
        .map_err(render_error("draw note heads"))?;

    // Text needs a system font; a missing one costs the labels, not the image
    let label_style = ("sans-serif", config.label_font_size)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    if let Err(e) = chart.draw_series(
        layout
            .glyphs
            .iter()
            .map(|g| Text::new(g.label.clone(), (g.x, g.y + 0.3), label_style.clone())),
    ) {
        warn!("Sheet labels not drawn: {:?}", e);
    }
    if let Err(e) = root.draw(&Text::new(
        config.title.clone(),
        (20, 10),
        ("sans-serif", config.label_font_size + 8).into_font(),
    )) {
        warn!("Sheet title not drawn: {:?}", e);
    }

    root.present().map_err(render_error("write image"))?;
    Ok(())
}

/// Render the notes to PNG bytes via a scratch file
pub fn render_sheet_png(notes: &[Note], config: &SheetConfig) -> Result<Vec<u8>> {
    let layout = layout_staff(notes);
    let scratch = tempfile::tempdir()?;
    let path = scratch.path().join("sheet.png");
    render_png_file(&layout, config, &path)?;
    let bytes = std::fs::read(&path)?;
    Ok(bytes)
}
