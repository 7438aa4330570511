//! Editing session: the layer stack, the scene vanishing points and the
//! gesture driven by pointer input.

use nalgebra::{Point2, Vector2};
use tracing::{debug, info, warn};

use crate::{
    PixelBuffer,
    compute::{VanishingPointPair, compute_two_point_vp, guide_lines},
    error::{PerspectiveError, PerspectiveResult},
    layer::Layer,
    render::{RenderItem, render},
    settings::EditorSettings,
    stack::{Direction, LayerHandle, LayerStack},
    utils::{centroid, closest_edge, closest_point_index},
    viewport::Viewport,
    warp::extract_quad_region,
};

/// Pointer input, positions in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown(Point2<f64>),
    PointerMove(Point2<f64>),
    PointerUp,
    Wheel(f64),
}

/// What the pointer currently holds.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Edit {
    Mark {
        layer: LayerHandle,
        index: usize,
    },
    /// `grab` is the pointer's offset from the edge line when pressed.
    Edge {
        layer: LayerHandle,
        edge: usize,
        grab: Vector2<f64>,
    },
    Corner {
        layer: LayerHandle,
        corner: usize,
    },
    Move {
        layer: LayerHandle,
        grab: Vector2<f64>,
    },
    FreeDrag {
        layer: LayerHandle,
        grab: Vector2<f64>,
    },
    #[default]
    None,
}

#[derive(Debug, Default)]
pub struct Editor {
    stack: LayerStack,
    current: Option<LayerHandle>,
    vanishing_points: Option<VanishingPointPair>,
    pub settings: EditorSettings,
    pub viewport: Viewport,
    marking: bool,
    edit: Edit,
}

impl Editor {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn layers(&self) -> &LayerStack {
        &self.stack
    }

    pub fn layer(&self, handle: LayerHandle) -> PerspectiveResult<&Layer> {
        self.stack
            .get(handle)
            .ok_or(PerspectiveError::UnknownLayer(handle))
    }

    pub fn layer_mut(&mut self, handle: LayerHandle) -> PerspectiveResult<&mut Layer> {
        self.stack
            .get_mut(handle)
            .ok_or(PerspectiveError::UnknownLayer(handle))
    }

    pub fn current(&self) -> Option<LayerHandle> {
        self.current
    }

    pub fn select_layer(&mut self, handle: LayerHandle) -> PerspectiveResult<()> {
        self.layer(handle)?;
        self.current = Some(handle);
        Ok(())
    }

    pub fn vanishing_points(&self) -> Option<&VanishingPointPair> {
        self.vanishing_points.as_ref()
    }

    pub fn edit(&self) -> Edit {
        self.edit
    }

    pub fn is_marking(&self) -> bool {
        self.marking
    }

    pub fn set_marking(&mut self, marking: bool) {
        self.marking = marking;
    }

    /// Adds an empty layer on top and makes it current.
    pub fn add_layer(&mut self, name: &str) -> LayerHandle {
        let name = if name.is_empty() {
            format!("Layer {}", self.stack.len() + 1)
        } else {
            name.to_string()
        };
        let handle = self.stack.push(name);
        self.current = Some(handle);
        info!("added layer {handle:?}");
        handle
    }

    pub fn set_layer_image(
        &mut self,
        handle: LayerHandle,
        image: PixelBuffer,
    ) -> PerspectiveResult<()> {
        let layer = self.layer_mut(handle)?;
        debug!(
            "{} gets a {}x{} image",
            layer.name,
            image.width(),
            image.height()
        );
        layer.set_image(image);
        Ok(())
    }

    /// Appends a mark; `false` once the layer already has four.
    pub fn append_control_point(
        &mut self,
        handle: LayerHandle,
        point: Point2<f64>,
    ) -> PerspectiveResult<bool> {
        Ok(self.layer_mut(handle)?.append_mark(point))
    }

    pub fn clear_points(&mut self, handle: LayerHandle) -> PerspectiveResult<()> {
        self.layer_mut(handle)?.clear_marks();
        self.vanishing_points = None;
        Ok(())
    }

    /// Recomputes the scene vanishing points from the layer's marks.
    ///
    /// On failure the previous pair is dropped.
    pub fn compute_vanishing_points(
        &mut self,
        handle: LayerHandle,
    ) -> PerspectiveResult<VanishingPointPair> {
        let marks = self.layer(handle)?.marks();
        match compute_two_point_vp(marks, self.settings.origin_exclusion_radius) {
            Ok(pair) => {
                info!("vanishing points {:?} {:?}", pair.vp1, pair.vp2);
                self.vanishing_points = Some(pair);
                Ok(pair)
            }
            Err(error) => {
                warn!("vanishing points unavailable: {error}");
                self.vanishing_points = None;
                Err(error)
            }
        }
    }

    pub fn guide_lines(
        &self,
        handle: LayerHandle,
    ) -> PerspectiveResult<Vec<(Point2<f64>, Point2<f64>)>> {
        let layer = self.layer(handle)?;
        Ok(self
            .vanishing_points
            .as_ref()
            .map(|pair| guide_lines(pair, layer.marks()))
            .unwrap_or_default())
    }

    /// Lifts the selection into a new layer directly above `handle`.
    pub fn paste_selection(&mut self, handle: LayerHandle) -> PerspectiveResult<LayerHandle> {
        let layer = self.layer(handle)?;
        let (region, origin) = lift_selection(layer, &self.settings)?;
        let name = format!("{} (pasted)", layer.name);
        let index = self
            .stack
            .index_of(handle)
            .ok_or(PerspectiveError::UnknownLayer(handle))?;

        let pasted_handle = self.stack.allocate_handle();
        let pasted = Layer::pasted(pasted_handle, name, region, origin, self.vanishing_points);
        self.stack.insert_above(index, pasted);
        self.current = Some(pasted_handle);
        info!("pasted {handle:?} selection as {pasted_handle:?} at {origin:?}");
        Ok(pasted_handle)
    }

    /// Moves warp corner `corner` and re-warps the layer.
    ///
    /// A drag that would degenerate the quad or blow up its bounds fails and
    /// leaves the layer as it was.
    pub fn drag_corner(
        &mut self,
        handle: LayerHandle,
        corner: usize,
        pos: Point2<f64>,
    ) -> PerspectiveResult<()> {
        let resample = self.settings.rewarp_resample;
        let max_growth = self.settings.max_rewarp_growth;
        self.layer_mut(handle)?
            .drag_corner(corner, pos, resample, max_growth)
    }

    /// Enters free-drag mode with the selection lifted out of the layer.
    pub fn begin_layer_drag(&mut self, handle: LayerHandle) -> PerspectiveResult<()> {
        let layer = self.layer(handle)?;
        let quad = layer
            .selection_quad()
            .ok_or(PerspectiveError::InsufficientPoints {
                found: layer.marks().len(),
            })?;
        let (region, _) = lift_selection(layer, &self.settings)?;
        let center =
            centroid(&quad).ok_or_else(|| PerspectiveError::degenerate("empty selection"))?;
        let vanishing_points = self.vanishing_points;
        self.layer_mut(handle)?
            .begin_free_drag(region, center, vanishing_points);
        Ok(())
    }

    pub fn update_layer_drag(
        &mut self,
        handle: LayerHandle,
        pos: Point2<f64>,
    ) -> PerspectiveResult<()> {
        let (min, max) = (self.settings.drag_scale_min, self.settings.drag_scale_max);
        self.layer_mut(handle)?.update_free_drag(pos, min, max);
        Ok(())
    }

    pub fn end_layer_drag(&mut self, handle: LayerHandle) -> PerspectiveResult<()> {
        self.layer_mut(handle)?.end_free_drag();
        if matches!(self.edit, Edit::FreeDrag { layer, .. } if layer == handle) {
            self.edit = Edit::None;
        }
        Ok(())
    }

    /// One wheel tick on a free-dragged layer.
    pub fn zoom_layer(&mut self, handle: LayerHandle, delta: f64) -> PerspectiveResult<()> {
        let factor = self.settings.zoom_step(delta);
        let (min, max) = (self.settings.zoom_min, self.settings.zoom_max);
        self.layer_mut(handle)?.zoom(factor, min, max);
        Ok(())
    }

    pub fn move_layer(
        &mut self,
        handle: LayerHandle,
        direction: Direction,
    ) -> PerspectiveResult<bool> {
        self.layer(handle)?;
        let moved = self.stack.move_layer(handle, direction);
        if moved {
            info!("layer {handle:?} moved {direction:?}");
        }
        Ok(moved)
    }

    /// Top-most visible layer showing pixels at `pos`.
    pub fn layer_at(&self, pos: &Point2<f64>) -> Option<LayerHandle> {
        self.stack
            .visible()
            .rev()
            .find(|layer| layer.contains(pos))
            .map(Layer::handle)
    }

    pub fn render(&self) -> Vec<RenderItem<'_>> {
        render(&self.stack, &self.viewport)
    }

    pub fn handle_event(&mut self, event: InputEvent) -> PerspectiveResult<()> {
        match event {
            InputEvent::PointerDown(pos) => self.pointer_down(pos),
            InputEvent::PointerMove(pos) => self.pointer_move(pos),
            InputEvent::PointerUp => {
                if let Edit::Corner { layer, .. } = self.edit {
                    self.layer_mut(layer)?.end_corner_drag();
                }
                self.edit = Edit::None;
                Ok(())
            }
            InputEvent::Wheel(delta) => {
                if delta == 0.0 {
                    return Ok(());
                }
                match self.current {
                    Some(handle) if self.layer(handle)?.free_drag().is_some() => {
                        self.zoom_layer(handle, delta)
                    }
                    _ => {
                        let factor = self.settings.zoom_step(delta);
                        self.viewport
                            .zoom(factor, self.settings.zoom_min, self.settings.zoom_max);
                        Ok(())
                    }
                }
            }
        }
    }

    fn pointer_down(&mut self, pos: Point2<f64>) -> PerspectiveResult<()> {
        if let Some(handle) = self.current {
            let layer = self.layer(handle)?;
            if layer.free_drag().is_some() {
                if layer.free_drag_contains(&pos) {
                    self.edit = Edit::FreeDrag {
                        layer: handle,
                        grab: pos - layer.layer_position(),
                    };
                    return Ok(());
                }
                return self.end_layer_drag(handle);
            }
            if self.marking {
                return self.press_while_marking(handle, pos);
            }
        }

        if let Some(handle) = self.layer_at(&pos) {
            let layer = self.layer(handle)?;
            self.edit = Edit::Move {
                layer: handle,
                grab: pos - layer.position,
            };
            self.current = Some(handle);
            debug!("grabbed {handle:?}");
        }
        Ok(())
    }

    fn press_while_marking(
        &mut self,
        handle: LayerHandle,
        pos: Point2<f64>,
    ) -> PerspectiveResult<()> {
        let radius = self.settings.hit_radius;
        let layer = self.layer(handle)?;

        if let Some(index) = closest_point_index(layer.marks(), &pos, radius) {
            self.edit = Edit::Mark { layer: handle, index };
            return Ok(());
        }
        if let Some((edge, projection)) = layer
            .selection_quad()
            .and_then(|quad| closest_edge(&quad, &pos, radius))
        {
            self.edit = Edit::Edge {
                layer: handle,
                edge,
                grab: pos - projection,
            };
            return Ok(());
        }
        if let Some(corner) = layer
            .warp_quad()
            .and_then(|quad| closest_point_index(quad, &pos, radius))
        {
            self.layer_mut(handle)?.begin_corner_drag(corner);
            self.edit = Edit::Corner { layer: handle, corner };
            return Ok(());
        }

        let layer = self.layer_mut(handle)?;
        layer.append_mark(pos);
        if layer.marks().len() == 4 {
            debug!("{} has four marks", layer.name);
            self.marking = false;
        }
        Ok(())
    }

    fn pointer_move(&mut self, pos: Point2<f64>) -> PerspectiveResult<()> {
        match self.edit {
            Edit::Mark { layer, index } => {
                self.layer_mut(layer)?.move_mark(index, pos);
                self.refresh_vanishing_points(layer)
            }
            Edit::Edge { layer, edge, grab } => {
                let Some(quad) = self.layer(layer)?.selection_quad() else {
                    return Ok(());
                };
                let start = quad[edge];
                let direction = quad[(edge + 1) % 4] - start;
                let length = direction.norm();
                if length == 0.0 {
                    return Ok(());
                }
                let normal = Vector2::new(direction.y, -direction.x) / length;
                let offset = (pos - grab - start).dot(&normal);
                self.layer_mut(layer)?.translate_edge(edge, normal * offset);
                self.refresh_vanishing_points(layer)
            }
            Edit::Corner { layer, corner } => self.drag_corner(layer, corner, pos),
            Edit::Move { layer, grab } => {
                let layer = self.layer_mut(layer)?;
                let delta = pos - grab - layer.position;
                layer.translate(delta);
                Ok(())
            }
            Edit::FreeDrag { layer, grab } => self.update_layer_drag(layer, pos - grab),
            Edit::None => Ok(()),
        }
    }

    /// Follows mark edits; an unusable quad just clears the pair.
    fn refresh_vanishing_points(&mut self, handle: LayerHandle) -> PerspectiveResult<()> {
        if self.layer(handle)?.marks().len() == 4 {
            if let Err(error) = self.compute_vanishing_points(handle) {
                debug!("marks no longer define a perspective: {error}");
            }
        }
        Ok(())
    }
}

/// Extracts the selection from the layer's shown pixels.
///
/// Returns the region and its top-left in scene space.
fn lift_selection(
    layer: &Layer,
    settings: &EditorSettings,
) -> PerspectiveResult<(PixelBuffer, Point2<f64>)> {
    let quad = layer
        .selection_quad()
        .ok_or(PerspectiveError::InsufficientPoints {
            found: layer.marks().len(),
        })?;
    let image = layer
        .warped_image()
        .ok_or(PerspectiveError::ImageUnavailable)?;
    let local = quad.map(|p| Point2::from(p - layer.position));
    let (region, bounds) = extract_quad_region(image, &local, settings.extract_resample)?;
    Ok((region, layer.position + bounds.origin().coords))
}
