//! Built-in grammars and parsing
//!
//! Languages are produced here and nowhere else. Each built-in grammar is
//! registered under a canonical name plus a few aliases; configuration can
//! narrow the set that `tree-sitter-language-load` will hand out.

use super::handle::{self, HandleKind};
use super::language::{self, LanguageData};
use super::node::{SyntaxTree, TreeHandle};
use super::{Context, SubrSpec, marshal};
use crate::host::{Env, Value};
use crate::{Error, Result};
use tree_sitter::{Language, Parser};

/// A grammar compiled into the crate
pub struct Grammar {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub extensions: &'static [&'static str],
    language: fn() -> Language,
}

impl Grammar {
    pub fn language(&self) -> Language {
        (self.language)()
    }

    fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

fn python() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

fn javascript() -> Language {
    tree_sitter_javascript::LANGUAGE.into()
}

fn rust() -> Language {
    tree_sitter_rust::LANGUAGE.into()
}

fn go() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

/// Every grammar compiled into the crate
pub const BUILTIN: &[Grammar] = &[
    Grammar {
        name: "python",
        aliases: &["py"],
        extensions: &["py", "pyi"],
        language: python,
    },
    Grammar {
        name: "javascript",
        aliases: &["js"],
        extensions: &["js", "jsx", "mjs", "cjs"],
        language: javascript,
    },
    Grammar {
        name: "rust",
        aliases: &["rs"],
        extensions: &["rs"],
        language: rust,
    },
    Grammar {
        name: "go",
        aliases: &["golang"],
        extensions: &["go"],
        language: go,
    },
];

/// Find a built-in grammar by name or alias
pub fn find(name: &str) -> Option<&'static Grammar> {
    BUILTIN.iter().find(|grammar| grammar.answers_to(name))
}

/// Find a built-in grammar by file extension
pub fn for_extension(extension: &str) -> Option<&'static Grammar> {
    BUILTIN
        .iter()
        .find(|grammar| grammar.extensions.iter().any(|ext| ext.eq_ignore_ascii_case(extension)))
}

/// Resolve `name` to a grammar the configuration allows
pub fn resolve(ctx: &Context, name: &str) -> Result<&'static Grammar> {
    find(name)
        .filter(|grammar| ctx.config.language_enabled(grammar.name))
        .ok_or_else(|| Error::UnknownLanguage(name.to_string()))
}

/// Parse `source` with `language`
pub fn parse(language: &Language, language_name: &str, source: &str) -> Result<SyntaxTree> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| Error::Parse(format!("Failed to set language: {}", e)))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::Parse("Failed to parse source".to_string()))?;
    tracing::debug!(
        "Parsed {} bytes of {} (has_error: {})",
        source.len(),
        language_name,
        tree.root_node().has_error()
    );
    Ok(SyntaxTree::new(tree, source.to_string(), language_name))
}

fn language_load(env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let name = marshal::string(&args[0])?;
    let grammar = resolve(ctx, name)?;
    tracing::debug!("Loading grammar {}", grammar.name);
    let data = LanguageData::new(grammar.name, grammar.language());
    handle::wrap(env, ctx, HandleKind::Language, data)
}

fn parse_string(env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let (name, language) = language::extract(ctx, &args[0])?;
    let source = marshal::string(&args[1])?;
    let tree = parse(&language, &name, source)?;
    handle::wrap(env, ctx, HandleKind::Tree, TreeHandle::new(tree))
}

pub(crate) const FUNCTIONS: &[SubrSpec] = &[
    SubrSpec {
        name: "tree-sitter-language-load",
        min_args: 1,
        max_args: 1,
        doc: "Load the built-in grammar called NAME.\n\n(fn NAME)",
        body: language_load,
    },
    SubrSpec {
        name: "tree-sitter-parse-string",
        min_args: 2,
        max_args: 2,
        doc: "Parse SOURCE with LANGUAGE and return a tree-sitter-tree.\n\n(fn LANGUAGE SOURCE)",
        body: parse_string,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Module, testing::loaded};
    use crate::config::BridgeConfig;

    #[test]
    fn test_find_by_name_and_alias() {
        assert_eq!(find("rust").map(|g| g.name), Some("rust"));
        assert_eq!(find("JS").map(|g| g.name), Some("javascript"));
        assert_eq!(find("golang").map(|g| g.name), Some("go"));
        assert!(find("cobol").is_none());
        assert_eq!(for_extension("pyi").map(|g| g.name), Some("python"));
    }

    #[test]
    fn test_every_builtin_parses() {
        for grammar in BUILTIN {
            let tree = parse(&grammar.language(), grammar.name, "x").unwrap();
            assert_eq!(tree.language(), grammar.name);
        }
    }

    #[test]
    fn test_language_load() {
        let (mut env, _module) = loaded();
        let lang = env.call("tree-sitter-language-load", &[Value::from("py")]).unwrap();
        assert_eq!(
            env.call("tree-sitter-language-name", &[lang]).unwrap().as_str(),
            Some("python")
        );

        let err = env.call("tree-sitter-language-load", &[Value::from("cobol")]).unwrap_err();
        assert_eq!(err.symbol.name(), "tree-sitter-error");
        let err = env.call("tree-sitter-language-load", &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.symbol.name(), "wrong-type-argument");
    }

    #[test]
    fn test_configuration_narrows_languages() {
        let mut env = Env::new();
        let config = BridgeConfig {
            languages: vec!["go".to_string()],
            ..BridgeConfig::default()
        };
        let _module = Module::load(&mut env, config);
        assert!(env.call("tree-sitter-language-load", &[Value::from("go")]).is_ok());
        assert!(env.call("tree-sitter-language-load", &[Value::from("rust")]).is_err());
    }

    #[test]
    fn test_parse_string() {
        let (mut env, _module) = loaded();
        let lang = env.call("tree-sitter-language-load", &[Value::from("rust")]).unwrap();
        let tree = env
            .call("tree-sitter-parse-string", &[lang.clone(), Value::from("fn f() {}")])
            .unwrap();
        assert!(env.call("tree-sitter-tree-p", &[tree]).unwrap().eq(&Value::T));

        let err = env
            .call("tree-sitter-parse-string", &[Value::from("rust"), Value::from("")])
            .unwrap_err();
        assert_eq!(err.data[0].to_string(), "tree-sitter-language-p");
        let err = env.call("tree-sitter-parse-string", &[lang, Value::Nil]).unwrap_err();
        assert_eq!(err.data[0].to_string(), "stringp");
    }
}
