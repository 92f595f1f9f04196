//! Pointer-driven placement of the pip panel.
//!
//! A `DragPositioner` exists only while the widget is in `pip`: the core builds
//! a fresh one on every entry and drops it on exit, so geometry from an earlier
//! pip session is never reused.
//!
//! Coordinates are viewport pixels with the origin at the top-left.  The
//! widget's top-left corner always lies in `[0, viewport - widget]` on both
//! axes; when the widget is larger than the viewport on an axis, that range
//! collapses to `0`.

use nowplaying_proto::protocol::{Point, Size};

use crate::error::{PlayerError, PlayerResult};

/// Smallest widget edge accepted as a real measurement.
pub const MIN_WIDGET_EDGE: f64 = 1.0;

/// Upper-left corner range the widget may occupy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    fn new(viewport: Size, widget: Size) -> Self {
        Self {
            max_x: (viewport.width - widget.width).max(0.0),
            max_y: (viewport.height - widget.height).max(0.0),
        }
    }

    pub fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(0.0, self.max_x), p.y.clamp(0.0, self.max_y))
    }

    pub fn contains(&self, p: Point) -> bool {
        (0.0..=self.max_x).contains(&p.x) && (0.0..=self.max_y).contains(&p.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragGeometry {
    pub position: Point,
    pub size: Size,
    pub bounds: Bounds,
}

#[derive(Debug, Clone)]
pub struct DragPositioner {
    geometry: DragGeometry,
    viewport: Size,
    /// Pointer offset from the widget's top-left, set while a drag is active.
    grab_offset: Option<Point>,
}

pub(crate) fn check_viewport(viewport: Size) -> PlayerResult<()> {
    let ok = viewport.width.is_finite()
        && viewport.height.is_finite()
        && viewport.width > 0.0
        && viewport.height > 0.0;
    if ok {
        Ok(())
    } else {
        Err(PlayerError::GeometryOverflow(format!(
            "viewport {}x{}",
            viewport.width, viewport.height
        )))
    }
}

fn check_widget(size: Size) -> PlayerResult<()> {
    let ok = size.width.is_finite()
        && size.height.is_finite()
        && size.width >= MIN_WIDGET_EDGE
        && size.height >= MIN_WIDGET_EDGE;
    if ok {
        Ok(())
    } else {
        Err(PlayerError::GeometryOverflow(format!(
            "widget {}x{}",
            size.width, size.height
        )))
    }
}

fn check_pointer(p: Point) -> PlayerResult<()> {
    if p.is_finite() {
        Ok(())
    } else {
        Err(PlayerError::GeometryOverflow(format!("pointer ({}, {})", p.x, p.y)))
    }
}

impl DragPositioner {
    /// Place a `widget`-sized panel at the bottom-right of `viewport`, inset by
    /// `margin`, then clamp it inside the viewport.
    pub fn enter(viewport: Size, widget: Size, margin: f64) -> PlayerResult<Self> {
        check_viewport(viewport)?;
        check_widget(widget)?;
        let margin = if margin.is_finite() { margin.max(0.0) } else { 0.0 };

        let bounds = Bounds::new(viewport, widget);
        let position = bounds.clamp(Point::new(
            viewport.width - widget.width - margin,
            viewport.height - widget.height - margin,
        ));

        Ok(Self {
            geometry: DragGeometry {
                position,
                size: widget,
                bounds,
            },
            viewport,
            grab_offset: None,
        })
    }

    pub fn geometry(&self) -> DragGeometry {
        self.geometry
    }

    pub fn position(&self) -> Point {
        self.geometry.position
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn is_dragging(&self) -> bool {
        self.grab_offset.is_some()
    }

    pub fn on_pointer_down(&mut self, pointer: Point) -> PlayerResult<()> {
        check_pointer(pointer)?;
        let pos = self.geometry.position;
        self.grab_offset = Some(Point::new(pointer.x - pos.x, pointer.y - pos.y));
        Ok(())
    }

    /// Move the panel under the pointer.  Returns the new top-left, or `None`
    /// when no drag is in progress.
    pub fn on_pointer_move(&mut self, pointer: Point) -> PlayerResult<Option<Point>> {
        let Some(offset) = self.grab_offset else {
            return Ok(None);
        };
        check_pointer(pointer)?;

        let wanted = Point::new(pointer.x - offset.x, pointer.y - offset.y);
        if wanted.x.is_nan() || wanted.y.is_nan() {
            return Err(PlayerError::GeometryOverflow(format!(
                "drag target ({}, {})",
                wanted.x, wanted.y
            )));
        }
        let next = self.geometry.bounds.clamp(wanted);
        self.geometry.position = next;
        Ok(Some(next))
    }

    pub fn on_pointer_up(&mut self) {
        self.grab_offset = None;
    }

    /// Recompute bounds for a new viewport and pull the panel back inside.
    /// Returns `true` when the panel had to move.
    pub fn on_viewport_resize(&mut self, viewport: Size) -> PlayerResult<bool> {
        check_viewport(viewport)?;
        let bounds = Bounds::new(viewport, self.geometry.size);
        let before = self.geometry.position;
        let after = bounds.clamp(before);

        self.viewport = viewport;
        self.geometry.bounds = bounds;
        self.geometry.position = after;
        Ok(before != after)
    }
}
