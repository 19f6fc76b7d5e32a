//! Language handles
//!
//! Languages come from the grammar loader and live at least as long as every
//! query compiled against them. The core only validates and reads them; it
//! never frees one. Besides the registry check, the payload carries a tag
//! string that must read `TSLanguage`.

use super::handle::{self, HandleKind};
use super::{Context, SubrSpec};
use crate::host::{Env, Value};
use crate::Result;

/// Tag every language payload carries
pub const LANGUAGE_TAG: &str = "TSLanguage";

/// Payload of a `tree-sitter-language` handle
pub struct LanguageData {
    tag: &'static str,
    name: String,
    language: tree_sitter::Language,
}

impl LanguageData {
    pub fn new(name: impl Into<String>, language: tree_sitter::Language) -> Self {
        Self {
            tag: LANGUAGE_TAG,
            name: name.into(),
            language,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_tag(tag: &'static str, name: &str, language: tree_sitter::Language) -> Self {
        Self {
            tag,
            name: name.to_string(),
            language,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &tree_sitter::Language {
        &self.language
    }
}

/// Whether `value` is a language handle with a valid tag
pub fn is_language(ctx: &Context, value: &Value) -> bool {
    let Some(ptr) = handle::validate(ctx, value, HandleKind::Language) else {
        return false;
    };
    ptr.borrow::<LanguageData>()
        .map(|data| data.tag == LANGUAGE_TAG)
        .unwrap_or(false)
}

/// The language and its name, or `None` if `value` is not a valid language
pub fn get(ctx: &Context, value: &Value) -> Option<(String, tree_sitter::Language)> {
    if !is_language(ctx, value) {
        return None;
    }
    let ptr = handle::validate(ctx, value, HandleKind::Language)?;
    let data = ptr.borrow::<LanguageData>().ok()?;
    Some((data.name.clone(), data.language.clone()))
}

/// Like [`get`], failing with `wrong-type-argument`
pub fn extract(ctx: &Context, value: &Value) -> Result<(String, tree_sitter::Language)> {
    get(ctx, value).ok_or_else(|| handle::wrong_type(HandleKind::Language, value))
}

fn language_p(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    Ok(Value::boolean(is_language(ctx, &args[0])))
}

fn language_name(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let (name, _) = extract(ctx, &args[0])?;
    Ok(Value::from(name))
}

pub(crate) const FUNCTIONS: &[SubrSpec] = &[
    SubrSpec {
        name: "tree-sitter-language-p",
        min_args: 1,
        max_args: 1,
        doc: "Return t if OBJECT is a tree-sitter-language.\n\n(fn OBJECT)",
        body: language_p,
    },
    SubrSpec {
        name: "tree-sitter-language-name",
        min_args: 1,
        max_args: 1,
        doc: "Return the name LANGUAGE was loaded under.\n\n(fn LANGUAGE)",
        body: language_name,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::{load_rust, loaded};

    #[test]
    fn test_loaded_language_is_valid() {
        let (mut env, module) = loaded();
        let lang = load_rust(&mut env);
        assert!(is_language(module.context(), &lang));
        assert!(env.call("tree-sitter-language-p", &[lang.clone()]).unwrap().eq(&Value::T));
        assert_eq!(
            env.call("tree-sitter-language-name", &[lang]).unwrap().as_str(),
            Some("rust")
        );
    }

    #[test]
    fn test_bad_tag_is_rejected() {
        let (mut env, module) = loaded();
        let ctx = module.context();
        let payload = LanguageData::with_tag("TSParser", "rust", tree_sitter_rust::LANGUAGE.into());
        let forged = handle::wrap(&mut env, ctx, HandleKind::Language, payload).unwrap();

        assert!(handle::validate(ctx, &forged, HandleKind::Language).is_some());
        assert!(!is_language(ctx, &forged));
        assert!(get(ctx, &forged).is_none());
    }

    #[test]
    fn test_non_languages() {
        let (mut env, module) = loaded();
        let cursor = env.call("tree-sitter-query-cursor-new", &[]).unwrap();
        assert!(get(module.context(), &cursor).is_none());
        assert!(get(module.context(), &Value::Int(1)).is_none());

        let err = env.call("tree-sitter-language-name", &[cursor]).unwrap_err();
        assert_eq!(err.symbol.name(), "wrong-type-argument");
        assert_eq!(err.data[0].to_string(), "tree-sitter-language-p");
    }
}
