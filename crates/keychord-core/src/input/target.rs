// Keychord Input Layer - Event Targets
// Originating elements and the policy deciding when shortcuts stay quiet

use std::sync::Arc;

use crate::input::KeyEvent;

/// Tags whose elements accept typed text
const EDITABLE_TAGS: &[&str] = &["input", "select", "textarea"];

/// Host-side element an event originated from
///
/// Only what the suppression policy needs is modelled: the tag, the class
/// list, the content-editable attribute and the parent chain.
#[derive(Debug, Clone, Default)]
pub struct Element {
    tag: String,
    classes: Vec<String>,
    /// Explicit `contenteditable` value; `None` inherits from the parent
    content_editable: Option<bool>,
    parent: Option<Arc<Element>>,
}

impl Element {
    /// Create a detached element with the given tag name
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
            content_editable: None,
            parent: None,
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_content_editable(mut self, editable: bool) -> Self {
        self.content_editable = Some(editable);
        self
    }

    /// Attach this element under `parent`
    pub fn child_of(mut self, parent: &Arc<Element>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Finish building, returning a shareable handle
    pub fn into_shared(self) -> Arc<Element> {
        Arc::new(self)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn parent(&self) -> Option<&Arc<Element>> {
        self.parent.as_ref()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Whether the element is content-editable, inheriting from ancestors
    pub fn is_content_editable(&self) -> bool {
        let mut current = Some(self);
        while let Some(element) = current {
            if let Some(editable) = element.content_editable {
                return editable;
            }
            current = element.parent.as_deref();
        }
        false
    }

    /// Whether typing into this element produces text
    pub fn is_editable(&self) -> bool {
        EDITABLE_TAGS
            .iter()
            .any(|tag| self.tag.eq_ignore_ascii_case(tag))
            || self.is_content_editable()
    }

    /// Whether this element is `ancestor` or sits anywhere below it
    pub fn is_within(&self, ancestor: &Element) -> bool {
        let mut current = Some(self);
        while let Some(element) = current {
            if std::ptr::eq(element, ancestor) {
                return true;
            }
            current = element.parent.as_deref();
        }
        false
    }
}

impl Drop for Element {
    /// Unlink the parent chain one ancestor at a time; stops at the first
    /// ancestor that is still shared
    fn drop(&mut self) {
        let mut next = self.parent.take();
        while let Some(parent) = next {
            match Arc::try_unwrap(parent) {
                Ok(mut element) => next = element.parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// Everything a suppression policy gets to look at
#[derive(Debug, Clone, Copy)]
pub struct SuppressionContext<'a> {
    pub event: &'a KeyEvent,
    /// The originating element, if the host tracks one
    pub element: Option<&'a Element>,
    /// Label of the combo about to fire
    pub combo: &'a str,
    /// Sequence label when the combo is a sequence link
    pub sequence: Option<&'a str>,
}

/// Decides whether a matched binding should stay quiet
///
/// The engine checks its own pause flag first, so policies only see events
/// while the engine is running.
pub trait SuppressionPolicy: Send {
    fn should_suppress(&self, ctx: &SuppressionContext<'_>) -> bool;
}

impl<F> SuppressionPolicy for F
where
    F: Fn(&SuppressionContext<'_>) -> bool + Send,
{
    fn should_suppress(&self, ctx: &SuppressionContext<'_>) -> bool {
        self(ctx)
    }
}

/// Suppress shortcuts while typing into editable elements
///
/// Elements carrying the opt-in class, and elements inside the engine's
/// scope element, always let shortcuts through.
#[derive(Debug, Clone)]
pub struct DefaultPolicy {
    opt_in_class: String,
    scope: Option<Arc<Element>>,
}

impl DefaultPolicy {
    pub fn new(opt_in_class: impl Into<String>, scope: Option<Arc<Element>>) -> Self {
        Self {
            opt_in_class: opt_in_class.into(),
            scope,
        }
    }
}

impl SuppressionPolicy for DefaultPolicy {
    fn should_suppress(&self, ctx: &SuppressionContext<'_>) -> bool {
        let Some(element) = ctx.element else {
            return false;
        };

        if element.has_class(&self.opt_in_class) {
            return false;
        }

        if let Some(scope) = &self.scope {
            if element.is_within(scope) {
                return false;
            }
        }

        element.is_editable()
    }
}
