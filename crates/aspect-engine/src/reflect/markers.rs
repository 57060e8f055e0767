//! Declarative markers attached to types, methods and properties

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::interceptor::Interceptor;

static NEXT_MARKER_ID: AtomicU64 = AtomicU64::new(1);

/// Binds a dedicated interceptor to whatever carries it
///
/// The interceptor is built on first use and then reused, so two members
/// share an interceptor instance exactly when they share the marker.
pub struct InterceptorMarker {
    id: u64,
    name: Arc<str>,
    make: Box<dyn Fn() -> Arc<dyn Interceptor> + Send + Sync>,
    instance: OnceCell<Arc<dyn Interceptor>>,
}

impl InterceptorMarker {
    /// Marker that constructs its interceptor lazily
    pub fn new<F>(name: &str, make: F) -> Arc<Self>
    where
        F: Fn() -> Arc<dyn Interceptor> + Send + Sync + 'static,
    {
        Arc::new(Self {
            id: NEXT_MARKER_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
            make: Box::new(make),
            instance: OnceCell::new(),
        })
    }

    /// Marker constructing `I` through `Default`
    pub fn of<I>(name: &str) -> Arc<Self>
    where
        I: Interceptor + Default + 'static,
    {
        Self::new(name, || Arc::new(I::default()) as Arc<dyn Interceptor>)
    }

    /// Unique marker id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Marker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interceptor for this marker, constructing it on first call
    pub fn interceptor(&self) -> Arc<dyn Interceptor> {
        self.instance.get_or_init(|| (self.make)()).clone()
    }

    /// Check if the interceptor has been constructed yet
    pub fn is_instantiated(&self) -> bool {
        self.instance.get().is_some()
    }
}

impl fmt::Debug for InterceptorMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorMarker")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("instantiated", &self.is_instantiated())
            .finish()
    }
}

/// Markers carried by a type, method or property
#[derive(Debug, Clone, Default)]
pub struct Markers {
    /// Opt out of proxying
    pub ignore_proxy: bool,
    /// Dedicated interceptor binding
    pub interceptor: Option<Arc<InterceptorMarker>>,
}

impl Markers {
    /// No markers
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if nothing is set
    pub fn is_empty(&self) -> bool {
        !self.ignore_proxy && self.interceptor.is_none()
    }

    /// Fill unset entries from `outer`
    pub(crate) fn inherit_from(&mut self, outer: &Markers) {
        self.ignore_proxy |= outer.ignore_proxy;
        if self.interceptor.is_none() {
            self.interceptor = outer.interceptor.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallResult;
    use crate::interceptor::CallContext;
    use std::sync::atomic::AtomicUsize;

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Counting;

    impl Interceptor for Counting {
        fn invoke(&self, call: &mut dyn CallContext) -> CallResult<()> {
            call.invoke().map(|_| ())
        }
    }

    #[test]
    fn test_marker_builds_once() {
        let marker = InterceptorMarker::new("counting", || {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Arc::new(Counting) as Arc<dyn Interceptor>
        });
        assert!(!marker.is_instantiated());

        let a = marker.interceptor();
        let b = marker.interceptor();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(marker.is_instantiated());
    }

    #[test]
    fn test_distinct_markers_have_distinct_ids() {
        let a = InterceptorMarker::of::<Counting>("a");
        let b = InterceptorMarker::of::<Counting>("a");
        assert_ne!(a.id(), b.id());
        assert!(!Arc::ptr_eq(&a.interceptor(), &b.interceptor()));
    }

    #[test]
    fn test_inherit_from_keeps_own_binding() {
        let own = InterceptorMarker::of::<Counting>("own");
        let outer = InterceptorMarker::of::<Counting>("outer");
        let mut markers = Markers {
            ignore_proxy: false,
            interceptor: Some(own.clone()),
        };
        markers.inherit_from(&Markers {
            ignore_proxy: true,
            interceptor: Some(outer),
        });
        assert!(markers.ignore_proxy);
        assert_eq!(markers.interceptor.unwrap().id(), own.id());
    }
}
