//! Reference resolution: expands `$ref` pointers into a single tree.
//!
//! The walk is depth-first. Each reference in flight is pushed onto a stack
//! of `(location, pointer)` frames bound to the node being built for it; a
//! reference whose frame is already on the stack closes a cycle and becomes
//! a [`Node::BackRef`] to that node instead of being inlined again.
//!
//! In lazy mode references are stored as [`Node::Pending`] together with a
//! snapshot of the stack, and expanded one level at a time when accessed.
//! Both modes produce the same tree once everything has been forced.

use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::document::{escape_segment, Document};
use crate::error::SpecError;
use crate::loader::DocumentCache;
use crate::location::Location;
use crate::reference::{navigate, parse_pointer, reference_of, Reference};
use crate::tree::{Node, NodeId, Tree};

/// An expanded reference, kept for diagnostics and reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    /// The literal `$ref` string.
    pub reference: String,
    /// Location of the document containing the reference.
    pub referrer: String,
    /// JSON Pointer of the reference node within the referrer.
    pub at: String,
    /// Location of the target document.
    pub target: String,
    /// JSON Pointer of the target node.
    pub pointer: String,
    /// True when the reference closed a cycle and was linked, not inlined.
    pub circular: bool,
}

/// State scoped to resolving one root document.
#[derive(Debug, Default)]
pub struct Session {
    cache: DocumentCache,
    references: Vec<ResolvedReference>,
}

impl Session {
    pub fn new(cache: DocumentCache) -> Self {
        Self {
            cache,
            references: Vec::new(),
        }
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DocumentCache {
        &mut self.cache
    }

    pub fn references(&self) -> &[ResolvedReference] {
        &self.references
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RefKey {
    location: Location,
    pointer: Vec<String>,
}

#[derive(Debug, Clone)]
struct Frame {
    key: RefKey,
    node: NodeId,
}

/// Position of the walk: the document being read and the pointer within it.
#[derive(Debug, Clone)]
struct Cursor {
    document: Rc<Document>,
    path: String,
}

impl Cursor {
    fn child(&self, segment: &str) -> Self {
        Self {
            document: Rc::clone(&self.document),
            path: format!("{}/{}", self.path, escape_segment(segment)),
        }
    }
}

/// A reference whose expansion has been deferred.
#[derive(Debug, Clone)]
pub struct PendingRef {
    pub reference: Reference,
    cursor: Cursor,
    stack: Vec<Frame>,
}

/// Result of a completed resolution. The session is gone; only the tree and
/// the registry of expanded references remain.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub location: Location,
    pub tree: Tree,
    pub references: Vec<ResolvedReference>,
}

impl ResolvedDocument {
    pub fn to_value(&self) -> Value {
        self.tree.to_value()
    }
}

/// An in-progress resolution of one root document.
#[derive(Debug)]
pub struct Resolution {
    session: Session,
    tree: Tree,
    root: Location,
    lazy: bool,
}

impl Resolution {
    /// Load `root` through the session cache and build its tree.
    ///
    /// In eager mode every reference is expanded before this returns. In
    /// lazy mode references are left pending until accessed.
    ///
    /// # Errors
    ///
    /// Returns the root document's fetch or parse error, or
    /// `SpecError::Resolution` for an unreachable reference (eager mode).
    pub fn open(mut session: Session, root: &Location, lazy: bool) -> Result<Self, SpecError> {
        let document = session.cache.load(root)?;
        let mut resolution = Self {
            session,
            tree: Tree::new(),
            root: root.clone(),
            lazy,
        };

        let slot = resolution.tree.root();
        // The root is on the stack so that `$ref: "#"` links back to it.
        let mut stack = vec![Frame {
            key: RefKey {
                location: root.clone(),
                pointer: Vec::new(),
            },
            node: slot,
        }];
        let cursor = Cursor {
            document: Rc::clone(&document),
            path: String::new(),
        };
        resolution.build(document.value(), &cursor, &mut stack, slot)?;
        Ok(resolution)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn location(&self) -> &Location {
        &self.root
    }

    /// Whether every reference has been expanded.
    pub fn is_complete(&self) -> bool {
        !self.tree.has_pending()
    }

    /// Look up the node at `pointer`, expanding deferred references along
    /// the path. Returns `None` if no such node exists.
    pub fn get(&mut self, pointer: &str) -> Result<Option<NodeId>, SpecError> {
        let Some(segments) = parse_pointer(pointer) else {
            return Ok(None);
        };

        let mut current = self.materialize(self.tree.root())?;
        for segment in &segments {
            let Some(child) = self.tree.child(current, segment) else {
                return Ok(None);
            };
            current = self.materialize(child)?;
        }
        Ok(Some(current))
    }

    /// Fully resolved value of the subtree at `pointer`. Circular links
    /// inside it are rendered relative to the subtree.
    pub fn value_at(&mut self, pointer: &str) -> Result<Option<Value>, SpecError> {
        let Some(id) = self.get(pointer)? else {
            return Ok(None);
        };
        self.force(id)?;
        Ok(Some(self.tree.value_of(id)))
    }

    /// Expand every remaining deferred reference.
    pub fn resolve_all(&mut self) -> Result<(), SpecError> {
        self.force(self.tree.root())
    }

    /// Complete the resolution and discard the session.
    pub fn finish(mut self) -> Result<ResolvedDocument, SpecError> {
        self.resolve_all()?;
        debug!(
            location = %self.root,
            references = self.session.references.len(),
            documents = self.session.cache.len(),
            "resolution complete"
        );
        Ok(ResolvedDocument {
            location: self.root,
            tree: self.tree,
            references: self.session.references,
        })
    }

    fn force(&mut self, id: NodeId) -> Result<(), SpecError> {
        loop {
            let pending = self.tree.pending_under(id);
            if pending.is_empty() {
                return Ok(());
            }
            for node in pending {
                self.expand_pending(node)?;
            }
        }
    }

    /// Expand `id` until it is neither deferred nor a link, returning the
    /// node that holds its content.
    fn materialize(&mut self, id: NodeId) -> Result<NodeId, SpecError> {
        loop {
            let current = self.tree.follow(id);
            if !self.expand_pending(current)? {
                return Ok(current);
            }
        }
    }

    /// Expand the node at `id` if it is pending. Returns whether it was.
    fn expand_pending(&mut self, id: NodeId) -> Result<bool, SpecError> {
        match self.tree.replace(id, Node::Null) {
            Some(Node::Pending(pending)) => {
                let mut stack = pending.stack.clone();
                match self.expand(pending.reference.clone(), &pending.cursor, &mut stack, id) {
                    Ok(()) => Ok(true),
                    Err(err) => {
                        // Stay pending so a later access reports the same error.
                        self.tree.set(id, Node::Pending(pending));
                        Err(err)
                    }
                }
            }
            Some(other) => {
                self.tree.set(id, other);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn build(
        &mut self,
        value: &Value,
        cursor: &Cursor,
        stack: &mut Vec<Frame>,
        slot: NodeId,
    ) -> Result<(), SpecError> {
        if let Some(raw) = reference_of(value) {
            let reference = Reference::parse(raw, cursor.document.location())?;
            if self.lazy {
                let pending = PendingRef {
                    reference,
                    cursor: cursor.clone(),
                    stack: stack.clone(),
                };
                self.tree.set(slot, Node::Pending(Box::new(pending)));
                return Ok(());
            }
            return self.expand(reference, cursor, stack, slot);
        }

        let node = match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => Node::Number(n.clone()),
            Value::String(s) => Node::String(s.clone()),
            Value::Array(items) => {
                let mut children = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let child = self.tree.reserve();
                    self.build(item, &cursor.child(&index.to_string()), stack, child)?;
                    children.push(child);
                }
                Node::Sequence(children)
            }
            Value::Object(map) => {
                let mut children = IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    let child = self.tree.reserve();
                    self.build(item, &cursor.child(key), stack, child)?;
                    children.insert(key.clone(), child);
                }
                Node::Mapping(children)
            }
        };
        self.tree.set(slot, node);
        Ok(())
    }

    fn expand(
        &mut self,
        reference: Reference,
        cursor: &Cursor,
        stack: &mut Vec<Frame>,
        slot: NodeId,
    ) -> Result<(), SpecError> {
        let key = RefKey {
            location: reference.location.clone(),
            pointer: reference.pointer.clone(),
        };

        let in_flight = stack
            .iter()
            .find(|frame| frame.key == key)
            .map(|frame| frame.node);
        if let Some(target) = in_flight {
            debug!(
                reference = %reference.raw,
                referrer = %cursor.document.location(),
                at = %cursor.path,
                "circular reference"
            );
            self.tree.set(
                slot,
                Node::BackRef {
                    target,
                    reference: reference.raw.clone(),
                },
            );
            self.record(&reference, cursor, true);
            return Ok(());
        }

        let document = if reference.location == *cursor.document.location() {
            Rc::clone(&cursor.document)
        } else {
            self.session
                .cache
                .load(&reference.location)
                .map_err(|e| SpecError::Resolution {
                    reference: reference.raw.clone(),
                    referrer: cursor.document.location().to_string(),
                    reason: format!("cannot load {}", reference.location),
                    source: Some(Box::new(e)),
                })?
        };

        let target = navigate(document.value(), &reference.pointer).ok_or_else(|| {
            SpecError::Resolution {
                reference: reference.raw.clone(),
                referrer: cursor.document.location().to_string(),
                reason: format!(
                    "no node at '{}' in {}",
                    reference.pointer_string(),
                    reference.location
                ),
                source: None,
            }
        })?;

        trace!(
            reference = %reference.raw,
            referrer = %cursor.document.location(),
            at = %cursor.path,
            "expanding reference"
        );

        let target_cursor = Cursor {
            document: Rc::clone(&document),
            path: reference.pointer_string(),
        };
        stack.push(Frame { key, node: slot });
        let result = self.build(target, &target_cursor, stack, slot);
        stack.pop();
        result?;

        self.record(&reference, cursor, false);
        Ok(())
    }

    fn record(&mut self, reference: &Reference, cursor: &Cursor, circular: bool) {
        self.session.references.push(ResolvedReference {
            reference: reference.raw.clone(),
            referrer: cursor.document.location().to_string(),
            at: cursor.path.clone(),
            target: reference.location.to_string(),
            pointer: reference.pointer_string(),
            circular,
        });
    }
}

/// Resolve an in-memory document located at `base` and return the merged
/// tree. External references are loaded relative to `base`.
///
/// # Errors
///
/// Returns `SpecError::Resolution` if any reference cannot be resolved.
pub fn resolve_value(value: Value, base: &Location) -> Result<Value, SpecError> {
    let mut session = Session::default();
    session
        .cache_mut()
        .insert(Document::new(base.clone(), value));
    let resolved = Resolution::open(session, base, false)?.finish()?;
    Ok(resolved.to_value())
}
