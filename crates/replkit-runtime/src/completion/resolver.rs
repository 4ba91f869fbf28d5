#![forbid(unsafe_code)]

//! Member resolution strategies.
//!
//! Two strategies exist. [`NativeIntrospection`] reflects over values whose
//! type the host runtime can describe ([`NativeType`]); it yields a tidy,
//! accessor-free list. [`EngineIntrospection`] asks the script engine to list
//! members and works for everything, at the cost of engine round trips.
//! [`ChainResolver`] tries them in order and takes the first that applies.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::engine::{LookupError, NativeType, ScopeHandle, ScriptEngine, Visibility};

use super::item::CompletionItem;

/// A way of listing the members of an object path.
pub trait MemberResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Candidates for `object_path`, or `Ok(None)` when this strategy does
    /// not apply to the value.
    fn resolve(
        &self,
        object_path: &str,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<CompletionItem>>, LookupError>;
}

const ACCESSOR_PREFIXES: [&str; 5] = ["get_", "set_", "add_", "remove_", "__"];

/// Public methods minus accessors and dunder names, plus properties and
/// fields; sorted and deduplicated.
pub fn native_member_names(ty: &NativeType) -> Vec<String> {
    let methods = ty
        .methods
        .iter()
        .filter(|m| m.visibility == Visibility::Public)
        .filter(|m| !ACCESSOR_PREFIXES.iter().any(|p| m.name.starts_with(p)))
        .map(|m| m.name.clone());
    let mut names: Vec<String> = methods
        .chain(ty.properties.iter().cloned())
        .chain(ty.fields.iter().cloned())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Regular names ordered case-insensitively, then dunder names in plain order.
pub fn order_engine_members(members: Vec<String>) -> Vec<String> {
    let (mut dunder, mut plain): (Vec<String>, Vec<String>) =
        members.into_iter().partition(|m| m.starts_with("__"));
    plain.sort_by_cached_key(|m| m.to_lowercase());
    dunder.sort();
    plain.extend(dunder);
    plain
}

/// Reflection over engine-reported native types.
pub struct NativeIntrospection {
    engine: Arc<dyn ScriptEngine>,
}

impl NativeIntrospection {
    pub fn new(engine: Arc<dyn ScriptEngine>) -> Self {
        Self { engine }
    }
}

impl MemberResolver for NativeIntrospection {
    fn name(&self) -> &'static str {
        "native"
    }

    fn resolve(
        &self,
        object_path: &str,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<CompletionItem>>, LookupError> {
        if object_path.is_empty() {
            return Ok(None);
        }
        cancel.check()?;
        let Some(ty) = self.engine.native_type(object_path, scope) else {
            return Ok(None);
        };
        tracing::trace!(target: "replkit.completion", path = object_path, ty = %ty.name, "native type");
        Ok(Some(
            native_member_names(&ty)
                .into_iter()
                .map(|name| CompletionItem::new(name, object_path, true))
                .collect(),
        ))
    }
}

/// The engine's own member listing.
pub struct EngineIntrospection {
    engine: Arc<dyn ScriptEngine>,
}

impl EngineIntrospection {
    pub fn new(engine: Arc<dyn ScriptEngine>) -> Self {
        Self { engine }
    }
}

impl MemberResolver for EngineIntrospection {
    fn name(&self) -> &'static str {
        "engine"
    }

    fn resolve(
        &self,
        object_path: &str,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<CompletionItem>>, LookupError> {
        let members = order_engine_members(self.engine.list_members(object_path, scope, cancel)?);
        let mut items = Vec::with_capacity(members.len());
        for member in members {
            // Globals with a native type describe themselves through it.
            let is_instance = if object_path.is_empty() {
                cancel.check()?;
                self.engine.native_type(&member, scope).is_some()
            } else {
                false
            };
            items.push(CompletionItem::new(member, object_path, is_instance));
        }
        Ok(Some(items))
    }
}

/// Tries each strategy in order; the first that applies wins.
pub struct ChainResolver {
    strategies: Vec<Box<dyn MemberResolver>>,
}

impl ChainResolver {
    pub fn new(strategies: Vec<Box<dyn MemberResolver>>) -> Self {
        Self { strategies }
    }

    /// Native introspection first, then the engine.
    pub fn standard(engine: Arc<dyn ScriptEngine>) -> Self {
        Self::new(vec![
            Box::new(NativeIntrospection::new(Arc::clone(&engine))),
            Box::new(EngineIntrospection::new(engine)),
        ])
    }
}

impl MemberResolver for ChainResolver {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn resolve(
        &self,
        object_path: &str,
        scope: &ScopeHandle,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<CompletionItem>>, LookupError> {
        for strategy in &self.strategies {
            if let Some(items) = strategy.resolve(object_path, scope, cancel)? {
                tracing::debug!(
                    target: "replkit.completion",
                    strategy = strategy.name(),
                    path = object_path,
                    count = items.len(),
                    "members resolved"
                );
                return Ok(Some(items));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        CompileOutcome, CompiledUnit, DocQuery, ExecutionFault, NativeMethod, SourceKind,
    };

    struct Fixture;

    impl ScriptEngine for Fixture {
        fn compile(&self, _source: &str, _kind: SourceKind) -> CompileOutcome {
            CompileOutcome::Incomplete
        }

        fn execute(
            &self,
            _unit: &CompiledUnit,
            _scope: &ScopeHandle,
            _cancel: &CancellationToken,
        ) -> Result<(), ExecutionFault> {
            Ok(())
        }

        fn list_members(
            &self,
            path: &str,
            _scope: &ScopeHandle,
            _cancel: &CancellationToken,
        ) -> Result<Vec<String>, LookupError> {
            match path {
                "" => Ok(vec!["wall".into(), "x".into()]),
                "x" => Ok(vec!["real".into(), "__add__".into(), "Imag".into(), "__abs__".into()]),
                other => Err(LookupError::Unresolved(other.into())),
            }
        }

        fn documentation(
            &self,
            _query: &DocQuery<'_>,
            _scope: &ScopeHandle,
            _cancel: &CancellationToken,
        ) -> Result<Option<String>, LookupError> {
            Ok(None)
        }

        fn native_type(&self, path: &str, _scope: &ScopeHandle) -> Option<NativeType> {
            (path == "wall").then(|| NativeType {
                name: "Wall".into(),
                methods: vec![
                    NativeMethod::public("Flip"),
                    NativeMethod::public("get_Width"),
                    NativeMethod::public("__init__"),
                    NativeMethod {
                        name: "Secret".into(),
                        visibility: Visibility::Private,
                    },
                ],
                properties: vec!["Width".into(), "Flip".into()],
                fields: vec!["Id".into()],
            })
        }
    }

    fn chain() -> ChainResolver {
        ChainResolver::standard(Arc::new(Fixture))
    }

    fn texts(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|i| i.text.as_str()).collect()
    }

    #[test]
    fn native_type_filters_accessors_and_dedupes() {
        let items = chain()
            .resolve("wall", &ScopeHandle::empty(), &CancellationToken::never())
            .unwrap()
            .unwrap();
        assert_eq!(texts(&items), ["Flip", "Id", "Width"]);
        assert!(items.iter().all(|i| i.is_instance && i.stub == "wall"));
    }

    #[test]
    fn engine_listing_puts_dunders_last() {
        let items = chain()
            .resolve("x", &ScopeHandle::empty(), &CancellationToken::never())
            .unwrap()
            .unwrap();
        assert_eq!(texts(&items), ["Imag", "real", "__abs__", "__add__"]);
        assert!(items.iter().all(|i| !i.is_instance));
    }

    #[test]
    fn globals_flag_native_values_as_instances() {
        let items = chain()
            .resolve("", &ScopeHandle::empty(), &CancellationToken::never())
            .unwrap()
            .unwrap();
        let wall = items.iter().find(|i| i.text == "wall").unwrap();
        assert!(wall.is_instance);
        let x = items.iter().find(|i| i.text == "x").unwrap();
        assert!(!x.is_instance);
    }

    #[test]
    fn unresolved_path_is_an_error() {
        let err = chain()
            .resolve("nope", &ScopeHandle::empty(), &CancellationToken::never())
            .unwrap_err();
        assert_eq!(err, LookupError::Unresolved("nope".into()));
    }

    #[test]
    fn cancelled_lookup_stops_early() {
        let source = crate::cancellation::CancellationSource::new();
        source.cancel();
        let err = chain()
            .resolve("wall", &ScopeHandle::empty(), &source.token())
            .unwrap_err();
        assert_eq!(err, LookupError::Interrupted);
    }
}
