use crate::config::Config;
use crate::db::Db;
use crate::error::Result;
use crate::model::{Call, Import, ResolutionStats, Symbol};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};

/// Receivers that refer to the enclosing class instance.
const SELF_RECEIVERS: &[&str] = &["self", "cls", "this", "super"];

/// Files kept in the per-run cache before it is flushed.
const FILE_CACHE_LIMIT: usize = 512;

/// Link unresolved call sites to the symbols they invoke. Must run after
/// import resolution: calls through imported names follow resolved imports.
pub fn resolve_calls(db: &Db, project_id: i64) -> Result<ResolutionStats> {
    let batch_size = Config::get().resolve_batch_size;
    let mut resolver = CallResolver::new(db, project_id);
    let mut last_id = 0;
    let mut newly_resolved = 0;

    loop {
        let batch = db.unresolved_calls_batch(project_id, last_id, batch_size)?;
        let Some(last) = batch.last() else {
            break;
        };
        last_id = last.id;

        let mut resolutions = Vec::new();
        for call in &batch {
            match resolver.resolve(call)? {
                Some(target) => resolutions.push((call.id, target)),
                None => debug!(
                    file = %call.file_path,
                    callee = %call.callee_name,
                    line = call.line_number,
                    "call left unresolved"
                ),
            }
        }
        newly_resolved += db.apply_call_resolutions(&resolutions)?;
    }

    let mut stats = db.call_stats(project_id)?;
    stats.newly_resolved = newly_resolved;
    info!(
        total = stats.total,
        resolved = stats.resolved,
        newly_resolved,
        "calls resolved"
    );
    Ok(stats)
}

/// Symbols and imports of one file, symbols ordered by start line.
struct FileContext {
    symbols: Vec<Symbol>,
    imports: Vec<Import>,
}

impl FileContext {
    fn symbol(&self, id: i64) -> Option<&Symbol> {
        self.symbols.iter().find(|symbol| symbol.id == id)
    }

    fn module_id(&self) -> Option<i64> {
        self.symbols
            .iter()
            .find(|symbol| symbol.parent_id.is_none() && symbol.kind == "module")
            .map(|symbol| symbol.id)
    }

    fn is_top_level(&self, symbol: &Symbol, module_id: Option<i64>) -> bool {
        symbol.parent_id.is_none() || symbol.parent_id == module_id
    }

    /// Callable symbol called `name`: top-level first, then earliest.
    fn best_named(&self, name: &str) -> Option<&Symbol> {
        let module_id = self.module_id();
        let mut named = self
            .symbols
            .iter()
            .filter(|symbol| symbol.name == name && symbol.kind != "module");
        let first = named.clone().next()?;
        Some(
            named
                .find(|symbol| self.is_top_level(symbol, module_id))
                .unwrap_or(first),
        )
    }

    /// What a bare `name` called from inside `source_id` refers to: a symbol
    /// declared in an enclosing function scope (innermost first), else a
    /// top-level one. Class members are never in scope for a bare name.
    fn scoped_named(&self, name: &str, source_id: i64) -> Option<&Symbol> {
        let module_id = self.module_id();
        let mut scope = self.symbol(source_id);
        // parent chains are acyclic; the bound only guards corrupt rows
        for _ in 0..=self.symbols.len() {
            let Some(current) = scope else {
                break;
            };
            if current.kind != "class" && current.kind != "module" {
                if let Some(found) = self.child_named(current.id, name) {
                    return Some(found);
                }
            }
            scope = current.parent_id.and_then(|id| self.symbol(id));
        }
        self.symbols.iter().find(|symbol| {
            symbol.name == name && symbol.kind != "module" && self.is_top_level(symbol, module_id)
        })
    }

    fn child_named(&self, parent_id: i64, name: &str) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|symbol| symbol.parent_id == Some(parent_id) && symbol.name == name)
    }

    /// Nearest class containing `id`, the symbol itself included.
    fn enclosing_class(&self, id: i64) -> Option<&Symbol> {
        let mut current = self.symbol(id)?;
        // parent chains are acyclic; the bound only guards corrupt rows
        for _ in 0..=self.symbols.len() {
            if current.kind == "class" {
                return Some(current);
            }
            current = self.symbol(current.parent_id?)?;
        }
        None
    }

    fn resolved_import(&self, binding: &str) -> Option<i64> {
        self.imports
            .iter()
            .filter(|import| import.is_resolved)
            .find(|import| import.local_name() == binding)
            .and_then(|import| import.resolved_symbol_id)
    }
}

struct CallResolver<'a> {
    db: &'a Db,
    project_id: i64,
    files: HashMap<String, Rc<FileContext>>,
    targets: HashMap<i64, Option<Symbol>>,
}

impl<'a> CallResolver<'a> {
    fn new(db: &'a Db, project_id: i64) -> Self {
        Self {
            db,
            project_id,
            files: HashMap::new(),
            targets: HashMap::new(),
        }
    }

    fn file(&mut self, file_path: &str) -> Result<Rc<FileContext>> {
        if let Some(file) = self.files.get(file_path) {
            return Ok(Rc::clone(file));
        }
        if self.files.len() >= FILE_CACHE_LIMIT {
            self.files.clear();
        }
        let file = Rc::new(FileContext {
            symbols: self.db.symbols_in_file(self.project_id, file_path)?,
            imports: self.db.imports_in_file(self.project_id, file_path)?,
        });
        self.files.insert(file_path.to_string(), Rc::clone(&file));
        Ok(file)
    }

    fn target(&mut self, id: i64) -> Result<Option<Symbol>> {
        if let Some(symbol) = self.targets.get(&id) {
            return Ok(symbol.clone());
        }
        let symbol = self.db.symbol(id)?;
        self.targets.insert(id, symbol.clone());
        Ok(symbol)
    }

    fn resolve(&mut self, call: &Call) -> Result<Option<i64>> {
        let file = self.file(&call.file_path)?;
        let callee = call.callee_name.as_str();

        if let Some((receiver, member)) = callee.split_once('.') {
            if SELF_RECEIVERS.contains(&receiver) {
                return Ok(resolve_self_call(&file, call.source_symbol_id, member));
            }
        }

        let Some((qualifier, member)) = callee.rsplit_once('.') else {
            return Ok(file
                .scoped_named(callee, call.source_symbol_id)
                .map(|symbol| symbol.id)
                .or_else(|| file.resolved_import(callee)));
        };

        let head = qualifier.split('.').next().unwrap_or(qualifier);
        let imported = file
            .resolved_import(qualifier)
            .or_else(|| file.resolved_import(head));
        if let Some(target_id) = imported {
            if let Some(found) = self.member_of_target(target_id, member)? {
                return Ok(Some(found));
            }
        }

        // `Class.method` within the same file
        let owner = qualifier.rsplit('.').next().unwrap_or(qualifier);
        Ok(file
            .symbols
            .iter()
            .filter(|symbol| symbol.name == owner)
            .find_map(|parent| file.child_named(parent.id, member))
            .map(|symbol| symbol.id))
    }

    /// `member` declared under the imported symbol, else anywhere in its file.
    fn member_of_target(&mut self, target_id: i64, member: &str) -> Result<Option<i64>> {
        let Some(target) = self.target(target_id)? else {
            return Ok(None);
        };
        let target_file = self.file(&target.file_path)?;
        Ok(target_file
            .child_named(target.id, member)
            .or_else(|| target_file.best_named(member))
            .map(|symbol| symbol.id))
    }
}

fn resolve_self_call(file: &FileContext, source_id: i64, member: &str) -> Option<i64> {
    if member.contains('.') {
        return None;
    }
    if let Some(class) = file.enclosing_class(source_id) {
        if let Some(method) = file.child_named(class.id, member) {
            return Some(method.id);
        }
    }
    file.best_named(member).map(|symbol| symbol.id)
}
