// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tiny_skia::Transform;

use crate::paint_server::Brush;
use crate::xml::Attributes;

/// A closed set of markup elements the visitors understand.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ElementKind {
    FixedPage,
    Canvas,
    CanvasRenderTransform,
    Path,
    PathFill,
    PathStroke,
    PathRenderTransform,
    Glyphs,
    GlyphsFill,
    GlyphsRenderTransform,
    MatrixTransform,
    SolidColorBrush,
    ImageBrush,
    ImageBrushTransform,
    Unknown,
}

impl ElementKind {
    /// Maps an element name to its kind.
    pub fn from_name(name: &str) -> Self {
        match name {
            "FixedPage" => ElementKind::FixedPage,
            "Canvas" => ElementKind::Canvas,
            "Canvas.RenderTransform" => ElementKind::CanvasRenderTransform,
            "Path" => ElementKind::Path,
            "Path.Fill" => ElementKind::PathFill,
            "Path.Stroke" => ElementKind::PathStroke,
            "Path.RenderTransform" => ElementKind::PathRenderTransform,
            "Glyphs" => ElementKind::Glyphs,
            "Glyphs.Fill" => ElementKind::GlyphsFill,
            "Glyphs.RenderTransform" => ElementKind::GlyphsRenderTransform,
            "MatrixTransform" => ElementKind::MatrixTransform,
            "SolidColorBrush" => ElementKind::SolidColorBrush,
            "ImageBrush" => ElementKind::ImageBrush,
            "ImageBrush.Transform" => ElementKind::ImageBrushTransform,
            _ => ElementKind::Unknown,
        }
    }

    /// Checks that the element saves and restores the painting state.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            ElementKind::Canvas | ElementKind::Path | ElementKind::Glyphs
        )
    }

    /// Checks that the element is a `*.RenderTransform` wrapper.
    pub fn is_render_transform(&self) -> bool {
        matches!(
            self,
            ElementKind::CanvasRenderTransform
                | ElementKind::PathRenderTransform
                | ElementKind::GlyphsRenderTransform
        )
    }
}

/// A value an element computes for its parent.
#[allow(missing_docs)]
#[derive(Clone, Debug)]
pub enum ComputedData {
    Brush(Brush),
    Transform(Transform),
}

/// An open or just closed markup element.
#[derive(Clone, Debug)]
pub struct RenderNode {
    /// Element name as written in the markup.
    pub name: String,
    /// Element kind.
    pub kind: ElementKind,
    /// Element attributes.
    pub attributes: Attributes,
    /// Processed children in document order.
    pub children: Vec<RenderNode>,
    /// A value set during the element end processing.
    pub data: Option<ComputedData>,
}

impl RenderNode {
    /// Creates a new node.
    pub fn new(name: &str, attributes: Attributes) -> Self {
        RenderNode {
            name: name.to_string(),
            kind: ElementKind::from_name(name),
            attributes,
            children: Vec::new(),
            data: None,
        }
    }

    /// Takes the computed data of the first child named `name`.
    ///
    /// Data can be taken only once.
    pub fn take_child_data(&mut self, name: &str) -> Option<ComputedData> {
        self.children
            .iter_mut()
            .find(|c| c.name == name)
            .and_then(|c| c.data.take())
    }

    /// Takes the brush computed by a child named `name`.
    pub fn child_brush(&mut self, name: &str) -> Option<Brush> {
        match self.take_child_data(name)? {
            ComputedData::Brush(brush) => Some(brush),
            ComputedData::Transform(_) => None,
        }
    }

    /// Takes the transform computed by a child named `name`.
    pub fn child_transform(&mut self, name: &str) -> Option<Transform> {
        match self.take_child_data(name)? {
            ComputedData::Transform(ts) => Some(ts),
            ComputedData::Brush(_) => None,
        }
    }

    /// Like [`RenderNode::child_transform`], but logs when the child is missing.
    pub fn required_child_transform(&mut self, name: &str) -> Option<Transform> {
        let ts = self.child_transform(name);
        if ts.is_none() {
            log::warn!("{} doesn't have a required {} child.", self.name, name);
        }
        ts
    }

    /// Moves the data of a single child into this node.
    ///
    /// Used by wrapper elements, like `Path.Fill`.
    pub(crate) fn forward_single_child(&mut self) {
        if self.children.len() != 1 {
            log::warn!(
                "{} must have exactly one child, but has {}.",
                self.name,
                self.children.len()
            );
        }

        self.data = self.children.first_mut().and_then(|c| c.data.take());
    }

    /// Computes the matrix of a `MatrixTransform` element.
    pub(crate) fn resolve_matrix_transform(&mut self) {
        let ts = match self.attributes.get("Matrix") {
            Some(value) => crate::transform::parse_matrix_ref(value),
            None => {
                log::warn!("MatrixTransform without a Matrix.");
                Transform::default()
            }
        };

        self.data = Some(ComputedData::Transform(ts));
    }
}

/// A stack of currently open elements.
///
/// The top is the innermost element.
#[derive(Clone, Default, Debug)]
pub struct ScopeStack {
    nodes: Vec<RenderNode>,
}

impl ScopeStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an element.
    pub fn push(&mut self, name: &str, attributes: Attributes) -> ElementKind {
        let node = RenderNode::new(name, attributes);
        let kind = node.kind;
        self.nodes.push(node);
        kind
    }

    /// Closes the innermost element.
    ///
    /// A name mismatch is logged, but the node is returned anyway.
    pub fn pop(&mut self, name: &str) -> Option<RenderNode> {
        let node = self.nodes.pop();
        match node {
            Some(ref node) if node.name != name => {
                log::warn!("Expected '{}' to be closed, got '{}'.", node.name, name);
            }
            None => log::warn!("'{}' was closed, but wasn't opened.", name),
            _ => {}
        }
        node
    }

    /// Attaches a processed node to its parent.
    ///
    /// Children of the node are dropped, since nobody will read them anymore.
    pub fn attach(&mut self, mut node: RenderNode) {
        node.children.clear();
        if let Some(parent) = self.nodes.last_mut() {
            parent.children.push(node);
        }
    }

    /// Returns the innermost element.
    pub fn top(&self) -> Option<&RenderNode> {
        self.nodes.last()
    }

    /// Returns the number of open elements.
    pub fn depth(&self) -> usize {
        self.nodes.len()
    }
}
