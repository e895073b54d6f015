//! Turns a dotted module name and a search path into candidate file paths.
//!
//! The search path is a `;`-separated list of templates, each with a `?`
//! placeholder for the module name. Templates ending in the plain source
//! extension are pointed at the sealed extension instead. No I/O happens here.

pub const TEMPLATE_SEPARATOR: char = ';';
pub const NAME_PLACEHOLDER: char = '?';
pub const MODULE_SEPARATOR: char = '.';
pub const PATH_SEPARATOR: &str = "/";
pub const SOURCE_EXTENSION: &str = ".lua";
pub const SEALED_EXTENSION: &str = ".lus";

/// Candidate paths for `module_name`, in search-path order.
pub fn resolve<'a>(module_name: &str, search_path: &'a str) -> impl Iterator<Item = String> + 'a {
    let module_path = module_name.replace(MODULE_SEPARATOR, PATH_SEPARATOR);
    search_path
        .split(TEMPLATE_SEPARATOR)
        .filter(|template| !template.is_empty())
        .map(move |template| candidate_path(template, &module_path))
}

fn candidate_path(template: &str, module_path: &str) -> String {
    let template = match template.strip_suffix(SOURCE_EXTENSION) {
        Some(stem) => format!("{stem}{SEALED_EXTENSION}"),
        None => template.to_string(),
    };
    template.replace(NAME_PLACEHOLDER, module_path)
}

#[cfg(test)]
mod tests {
    use super::resolve;

    #[test]
    fn substitutes_and_translates_separators() {
        let candidates: Vec<_> = resolve("x.y", "a/?.lus;b/?.lus").collect();
        assert_eq!(candidates, vec!["a/x/y.lus", "b/x/y.lus"]);
    }

    #[test]
    fn rewrites_source_extension() {
        let candidates: Vec<_> = resolve("game.state", "?.lua;?/init.lua;lib/?.so").collect();
        assert_eq!(
            candidates,
            vec!["game/state.lus", "game/state/init.lus", "lib/game/state.so"]
        );
    }

    #[test]
    fn skips_empty_templates() {
        let candidates: Vec<_> = resolve("m", ";;?.lua;").collect();
        assert_eq!(candidates, vec!["m.lus"]);
    }

    #[test]
    fn empty_search_path_yields_nothing() {
        assert_eq!(resolve("m", "").count(), 0);
    }

    #[test]
    fn only_trailing_extension_is_rewritten() {
        let candidates: Vec<_> = resolve("m", "x.lua.d/?.lua").collect();
        assert_eq!(candidates, vec!["x.lua.d/m.lus"]);
    }
}
