use nalgebra::{Point2, Vector2};
use tracing::{debug, trace};

use crate::{
    PixelBuffer, Quad,
    compute::VanishingPointPair,
    constrain::solve_constrained_quad,
    error::{PerspectiveError, PerspectiveResult},
    stack::LayerHandle,
    warp::{Resample, warp_onto_quad},
};

/// Baseline captured once when a layer enters free-drag mode.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeDrag {
    pub initial_center: Point2<f64>,
    /// Scene vanishing points at the start of the session, if any existed.
    pub vanishing_points: Option<VanishingPointPair>,
    pub initial_distances: [f64; 2],
    /// Image lifted out of the selection, drawn centred on the anchor.
    pub image: PixelBuffer,
}

impl FreeDrag {
    pub fn new(
        initial_center: Point2<f64>,
        vanishing_points: Option<VanishingPointPair>,
        image: PixelBuffer,
    ) -> Self {
        let initial_distances = vanishing_points.map_or([1.0, 1.0], |pair| {
            pair.as_array().map(|vp| vp.distance_from(&initial_center))
        });
        Self {
            initial_center,
            vanishing_points,
            initial_distances,
            image,
        }
    }

    /// Scale for `anchor`, from the distance ratio to the vanishing point the drag heads along.
    ///
    /// `None` without vanishing points: the scale is left as it is.
    pub fn scale_at(&self, anchor: &Point2<f64>, min: f64, max: f64) -> Option<f64> {
        let pair = self.vanishing_points?;
        let motion = anchor - self.initial_center;
        let [vp1, vp2] = pair.as_array();
        let (vp, initial) = if vp1.angle_to(&self.initial_center, &motion)
            < vp2.angle_to(&self.initial_center, &motion)
        {
            (vp1, self.initial_distances[0])
        } else {
            (vp2, self.initial_distances[1])
        };
        let current = vp.distance_from(anchor);
        let ratio = if initial == 0.0 || !initial.is_finite() || !current.is_finite() {
            1.0
        } else {
            current / initial
        };
        Some(ratio.clamp(min, max))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragSession {
    #[default]
    Idle,
    FreeDragging(FreeDrag),
    ConstrainedDragging {
        corner: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Layer {
    handle: LayerHandle,
    pub name: String,
    pub visible: bool,
    opacity: f64,
    original_image: Option<PixelBuffer>,
    warped_image: Option<PixelBuffer>,
    /// Top-left of the warped image in scene space.
    pub position: Point2<f64>,
    /// Corner marks; they are both the control points and the selection.
    marks: Vec<Point2<f64>>,
    warp_quad: Option<Quad>,
    source_vanishing_points: Option<VanishingPointPair>,
    original_size: Vector2<f64>,
    layer_scale: f64,
    /// Anchor of the free-dragged image.
    layer_position: Point2<f64>,
    session: DragSession,
}

impl Layer {
    pub fn new(handle: LayerHandle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
            visible: true,
            opacity: 1.0,
            original_image: None,
            warped_image: None,
            position: Point2::origin(),
            marks: Vec::with_capacity(4),
            warp_quad: None,
            source_vanishing_points: None,
            original_size: Vector2::zeros(),
            layer_scale: 1.0,
            layer_position: Point2::origin(),
            session: DragSession::Idle,
        }
    }

    /// A layer pasted from `image` with its top-left at `origin`, keeping
    /// `vanishing_points` as its constraint.
    pub fn pasted(
        handle: LayerHandle,
        name: impl Into<String>,
        image: PixelBuffer,
        origin: Point2<f64>,
        vanishing_points: Option<VanishingPointPair>,
    ) -> Self {
        let (w, h) = (f64::from(image.width()), f64::from(image.height()));
        let mut layer = Self::new(handle, name);
        layer.warp_quad = Some([
            origin,
            origin + Vector2::new(w, 0.0),
            origin + Vector2::new(w, h),
            origin + Vector2::new(0.0, h),
        ]);
        layer.original_size = Vector2::new(w, h);
        layer.source_vanishing_points = vanishing_points;
        layer.position = origin;
        layer.set_image(image);
        layer
    }

    pub fn handle(&self) -> LayerHandle {
        self.handle
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn original_image(&self) -> Option<&PixelBuffer> {
        self.original_image.as_ref()
    }

    pub fn warped_image(&self) -> Option<&PixelBuffer> {
        self.warped_image.as_ref()
    }

    /// Replaces the original image; the constrained edge lengths follow its size.
    pub fn set_image(&mut self, image: PixelBuffer) {
        self.original_size = Vector2::new(f64::from(image.width()), f64::from(image.height()));
        self.warped_image = Some(image.clone());
        self.original_image = Some(image);
    }

    pub fn marks(&self) -> &[Point2<f64>] {
        &self.marks
    }

    pub fn control_points(&self) -> &[Point2<f64>] {
        &self.marks
    }

    pub fn selection_points(&self) -> &[Point2<f64>] {
        &self.marks
    }

    pub fn selection_quad(&self) -> Option<Quad> {
        self.marks.as_slice().try_into().ok()
    }

    /// Appends a mark; returns false once four exist.
    pub fn append_mark(&mut self, point: Point2<f64>) -> bool {
        if self.marks.len() >= 4 {
            return false;
        }
        self.marks.push(point);
        true
    }

    pub fn move_mark(&mut self, index: usize, point: Point2<f64>) {
        if let Some(mark) = self.marks.get_mut(index) {
            *mark = point;
        }
    }

    /// Moves both marks of selection edge `edge` by `delta`.
    pub fn translate_edge(&mut self, edge: usize, delta: Vector2<f64>) {
        if self.marks.len() < 4 {
            return;
        }
        for index in [edge % 4, (edge + 1) % 4] {
            self.marks[index] += delta;
        }
    }

    pub fn clear_marks(&mut self) {
        self.marks.clear();
    }

    pub fn warp_quad(&self) -> Option<&Quad> {
        self.warp_quad.as_ref()
    }

    pub fn source_vanishing_points(&self) -> Option<&VanishingPointPair> {
        self.source_vanishing_points.as_ref()
    }

    pub fn original_size(&self) -> Vector2<f64> {
        self.original_size
    }

    pub fn layer_scale(&self) -> f64 {
        self.layer_scale
    }

    pub fn layer_position(&self) -> Point2<f64> {
        self.layer_position
    }

    pub fn session(&self) -> &DragSession {
        &self.session
    }

    pub fn free_drag(&self) -> Option<&FreeDrag> {
        match &self.session {
            DragSession::FreeDragging(drag) => Some(drag),
            _ => None,
        }
    }

    /// Scene rectangle covered by the warped image.
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        let Some(image) = &self.warped_image else {
            return false;
        };
        let local = point - self.position;
        local.x >= 0.0
            && local.y >= 0.0
            && local.x < f64::from(image.width())
            && local.y < f64::from(image.height())
    }

    /// Top-left and size of the free-dragged image at the current scale.
    pub fn free_drag_rect(&self) -> Option<(Point2<f64>, Vector2<f64>)> {
        let drag = self.free_drag()?;
        let size = Vector2::new(
            f64::from(drag.image.width()),
            f64::from(drag.image.height()),
        ) * self.layer_scale;
        Some((self.layer_position - size / 2.0, size))
    }

    pub fn free_drag_contains(&self, point: &Point2<f64>) -> bool {
        self.free_drag_rect().is_some_and(|(top_left, size)| {
            let local = point - top_left;
            local.x >= 0.0 && local.y >= 0.0 && local.x <= size.x && local.y <= size.y
        })
    }

    /// Warps the original image onto the warp quad and places it at the quad's bounds.
    pub fn apply_perspective(
        &mut self,
        resample: Resample,
        max_growth: f64,
    ) -> PerspectiveResult<()> {
        if self.original_image.is_none() {
            return Err(PerspectiveError::ImageUnavailable);
        }
        let quad = self
            .warp_quad
            .ok_or(PerspectiveError::InsufficientPoints { found: 0 })?;
        self.rewarp_onto(quad, resample, max_growth)
    }

    /// Warps onto `quad` and, only when that succeeds, commits the quad, image and position.
    fn rewarp_onto(
        &mut self,
        quad: Quad,
        resample: Resample,
        max_growth: f64,
    ) -> PerspectiveResult<()> {
        let image = self
            .original_image
            .as_ref()
            .ok_or(PerspectiveError::ImageUnavailable)?;
        let (warped, bounds) = warp_onto_quad(image, &quad, resample, max_growth)?;
        trace!("{} rewarped into {bounds:?}", self.name);
        self.warp_quad = Some(quad);
        self.warped_image = Some(warped);
        self.position = bounds.origin();
        Ok(())
    }

    /// Whether corner drags run through the perspective constraint.
    pub fn is_constrained(&self) -> bool {
        self.warp_quad.is_some() && self.source_vanishing_points.is_some()
    }

    pub fn begin_corner_drag(&mut self, corner: usize) {
        if self.is_constrained() {
            self.session = DragSession::ConstrainedDragging { corner };
        }
    }

    /// The warp quad with `corner` moved to `pos`, re-deriving the others when constrained.
    pub fn dragged_quad(&self, corner: usize, pos: Point2<f64>) -> PerspectiveResult<Quad> {
        let mut quad = self
            .warp_quad
            .ok_or(PerspectiveError::InsufficientPoints { found: 0 })?;
        match &self.source_vanishing_points {
            Some(vanishing_points) => {
                quad = solve_constrained_quad(
                    &quad,
                    corner,
                    pos,
                    vanishing_points,
                    self.original_size.x,
                    self.original_size.y,
                );
            }
            None => quad[corner % 4] = pos,
        }
        Ok(quad)
    }

    /// Moves warp corner `corner` to `pos` and re-warps.
    ///
    /// On error the layer keeps its previous quad, image and position.
    pub fn drag_corner(
        &mut self,
        corner: usize,
        pos: Point2<f64>,
        resample: Resample,
        max_growth: f64,
    ) -> PerspectiveResult<()> {
        let quad = self.dragged_quad(corner, pos)?;
        self.rewarp_onto(quad, resample, max_growth)
    }

    pub fn end_corner_drag(&mut self) {
        if matches!(self.session, DragSession::ConstrainedDragging { .. }) {
            self.session = DragSession::Idle;
        }
    }

    /// Moves the layer and its warp quad together.
    pub fn translate(&mut self, delta: Vector2<f64>) {
        self.position += delta;
        if let Some(quad) = self.warp_quad.as_mut() {
            for corner in quad.iter_mut() {
                *corner += delta;
            }
        }
    }

    pub fn begin_free_drag(
        &mut self,
        image: PixelBuffer,
        center: Point2<f64>,
        vanishing_points: Option<VanishingPointPair>,
    ) {
        debug!("{} enters free drag at {center:?}", self.name);
        self.layer_position = center;
        self.layer_scale = 1.0;
        self.session = DragSession::FreeDragging(FreeDrag::new(center, vanishing_points, image));
    }

    /// Moves the anchor; the derived scale overwrites any zoom applied before.
    pub fn update_free_drag(&mut self, anchor: Point2<f64>, min_scale: f64, max_scale: f64) {
        let DragSession::FreeDragging(drag) = &self.session else {
            return;
        };
        if let Some(scale) = drag.scale_at(&anchor, min_scale, max_scale) {
            self.layer_scale = scale;
        }
        self.layer_position = anchor;
        trace!("anchor {anchor:?}, scale {}", self.layer_scale);
    }

    pub fn end_free_drag(&mut self) {
        if matches!(self.session, DragSession::FreeDragging(_)) {
            debug!("{} leaves free drag", self.name);
            self.session = DragSession::Idle;
        }
    }

    /// Multiplies the free-drag scale by `factor`, clamped to `min..=max`.
    pub fn zoom(&mut self, factor: f64, min: f64, max: f64) {
        self.layer_scale = (self.layer_scale * factor).clamp(min, max);
    }
}
