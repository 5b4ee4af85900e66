//! Packing groups into output files

use std::fmt::Write;

use anyhow::Result;
use indexmap::IndexMap;

use crate::config::OutputFormat;
use crate::graph::{ModuleId, ModuleRecord};
use crate::group::CollectedGroup;

/// Render a group in the requested format
pub fn pack_group(group: &CollectedGroup, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Script => pack_script(group),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&group.modules)?),
    }
}

/// Concatenate module definitions behind the shared runtime, then run the
/// group's entry modules
fn pack_script(group: &CollectedGroup) -> Result<String> {
    let mut code = String::new();
    code.push_str(RUNTIME_HEADER);
    writeln!(code, "// Group: {}", group.label)?;

    for module in &group.modules {
        write_definition(&mut code, module)?;
    }

    for module in group.modules.iter().filter(|m| m.entry) {
        writeln!(
            code,
            "__chunkfactor_require__({});",
            serde_json::to_string(&module.id)?
        )?;
    }

    Ok(code)
}

fn write_definition(code: &mut String, module: &ModuleRecord) -> Result<()> {
    let deps: IndexMap<&str, &ModuleId> = module
        .deps
        .iter()
        .filter_map(|(key, target)| target.as_ref().map(|t| (key.as_str(), t)))
        .collect();

    if let Some(file) = &module.file {
        writeln!(code, "// Module: {}", file)?;
    }
    writeln!(
        code,
        "__chunkfactor_modules__[{}] = [function (require, module, exports) {{\n{}\n}}, {}];",
        serde_json::to_string(&module.id)?,
        module.source,
        serde_json::to_string(&deps)?
    )?;
    Ok(())
}

/// Module runtime; every packed script starts with it and only the first one
/// loaded installs it
const RUNTIME_HEADER: &str = r#"// chunkfactor runtime
(function (global) {
  global.__chunkfactor_modules__ = global.__chunkfactor_modules__ || {};
  if (global.__chunkfactor_require__) return;

  var definitions = global.__chunkfactor_modules__;
  var cache = {};

  function load(id) {
    if (cache[id]) {
      return cache[id].exports;
    }

    var definition = definitions[id];
    if (!definition) {
      throw new Error('chunkfactor: module "' + id + '" has not been loaded');
    }

    var module = { exports: {} };
    cache[id] = module;
    definition[0].call(module.exports, function (key) {
      var target = definition[1][key];
      return load(target === undefined ? key : target);
    }, module, module.exports);

    return module.exports;
  }

  global.__chunkfactor_require__ = load;
})(typeof globalThis !== 'undefined' ? globalThis : this);
"#;
