//! Whole-file signal pass
//!
//! Runs after the adapter and derives signals that need to see more than one
//! unit at a time: in-file call edges and multi-class design patterns.
//! The pass only adds to `SourceUnit::signals`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Signal, SourceFile, UnitKind};

static RE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());

static RE_CONSTRUCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][A-Za-z0-9_]*)\s*(?:\(|\{|::)").unwrap());

static RE_NEW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnew\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

const SUBSCRIBE_NAMES: &[&str] = &["subscribe", "addlistener", "addobserver", "attach", "register", "on"];
const NOTIFY_NAMES: &[&str] = &["notify", "emit", "publish", "dispatch", "broadcast", "fire"];
const SINGLETON_ACCESSORS: &[&str] = &["instance", "getinstance", "shared", "sharedinstance", "default_instance"];

/// Signals to add, keyed by unit index
pub type SignalPlan = BTreeMap<usize, BTreeSet<Signal>>;

/// Compute whole-file signals without touching the file
pub fn plan(file: &SourceFile) -> SignalPlan {
    let mut plan = SignalPlan::new();
    call_edges(file, &mut plan);
    factories(file, &mut plan);
    strategies(file, &mut plan);
    builders(file, &mut plan);
    observers_and_singletons(file, &mut plan);
    plan
}

/// Merge a plan into the file's units
pub fn apply(file: &mut SourceFile, plan: SignalPlan) {
    for (index, signals) in plan {
        if let Some(unit) = file.units.get_mut(index) {
            unit.signals.extend(signals);
        }
    }
}

/// Run the whole pass
pub fn enrich(file: &mut SourceFile) {
    let plan = plan(file);
    apply(file, plan);
}

fn add(plan: &mut SignalPlan, index: usize, signal: Signal) {
    plan.entry(index).or_default().insert(signal);
}

fn call_edges(file: &SourceFile, plan: &mut SignalPlan) {
    let mut callables: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, unit) in file.units.iter().enumerate() {
        if unit.kind.is_callable() && !unit.is_unparsed() {
            callables.entry(unit.name.as_str()).or_default().push(i);
        }
    }

    for (caller_idx, caller) in file.units.iter().enumerate() {
        if !caller.kind.is_callable() || caller.is_unparsed() {
            continue;
        }
        let called: BTreeSet<&str> = RE_CALL
            .captures_iter(caller.body())
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .filter(|name| *name != caller.name && callables.contains_key(name))
            .collect();

        for name in called {
            add(plan, caller_idx, Signal::Calls(name.to_string()));
            for &callee_idx in callables.get(name).into_iter().flatten() {
                add(plan, callee_idx, Signal::CalledBy(caller.name.clone()));
            }
        }
    }
}

fn class_names(file: &SourceFile) -> BTreeSet<&str> {
    file.units
        .iter()
        .filter(|u| u.kind == UnitKind::Class)
        .map(|u| u.name.as_str())
        .collect()
}

fn factories(file: &SourceFile, plan: &mut SignalPlan) {
    let classes = class_names(file);
    if classes.len() < 2 {
        return;
    }

    for (i, unit) in file.units.iter().enumerate() {
        if !unit.kind.is_callable() || unit.is_unparsed() {
            continue;
        }
        let owner = file.parent_of(unit).map(|p| p.name.as_str());
        let body = unit.body();
        let constructed: BTreeSet<&str> = RE_CONSTRUCT
            .captures_iter(body)
            .chain(RE_NEW.captures_iter(body))
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .filter(|name| classes.contains(name) && Some(*name) != owner)
            .collect();
        if constructed.len() >= 2 {
            add(plan, i, Signal::Factory);
        }
    }
}

fn strategies(file: &SourceFile, plan: &mut SignalPlan) {
    let mut bases: HashMap<&str, usize> = HashMap::new();
    for (i, unit) in file.units.iter().enumerate() {
        if unit.kind == UnitKind::Class {
            bases.entry(unit.name.as_str()).or_insert(i);
        }
    }

    let mut implementors: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, unit) in file.units.iter().enumerate() {
        if unit.kind != UnitKind::Class {
            continue;
        }
        for supertype in &unit.supertypes {
            if supertype != &unit.name && bases.contains_key(supertype.as_str()) {
                implementors.entry(supertype.as_str()).or_default().push(i);
            }
        }
    }

    for (base, members) in implementors {
        if members.len() < 2 {
            continue;
        }
        if let Some(&base_idx) = bases.get(base) {
            add(plan, base_idx, Signal::Strategy);
        }
        for idx in members {
            add(plan, idx, Signal::Strategy);
        }
    }
}

fn builders(file: &SourceFile, plan: &mut SignalPlan) {
    let classes: HashMap<&str, usize> = file
        .units
        .iter()
        .enumerate()
        .filter(|(_, u)| u.kind == UnitKind::Class)
        .map(|(i, u)| (u.name.as_str(), i))
        .collect();

    for (name, &idx) in &classes {
        let Some(target) = name.strip_suffix("Builder") else {
            continue;
        };
        if let Some(&target_idx) = classes.get(target) {
            add(plan, idx, Signal::Builder);
            add(plan, target_idx, Signal::Builder);
        }
    }
}

fn normalized(name: &str) -> String {
    name.to_lowercase().replace('_', "")
}

fn observers_and_singletons(file: &SourceFile, plan: &mut SignalPlan) {
    for (i, unit) in file.units.iter().enumerate() {
        if unit.kind != UnitKind::Class {
            continue;
        }
        let methods: Vec<String> = file
            .children(&unit.id)
            .filter(|c| c.kind.is_callable())
            .map(|c| normalized(&c.name))
            .collect();

        let subscribes = methods
            .iter()
            .any(|m| SUBSCRIBE_NAMES.iter().any(|s| m == s || (s.len() > 2 && m.starts_with(s))));
        let notifies = methods
            .iter()
            .any(|m| NOTIFY_NAMES.iter().any(|n| m.starts_with(n)));
        if subscribes && notifies {
            add(plan, i, Signal::Observer);
        }

        let accessor = methods.iter().any(|m| {
            SINGLETON_ACCESSORS
                .iter()
                .any(|a| m == &normalized(a))
        });
        if accessor {
            add(plan, i, Signal::Singleton);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parser::{LanguageAdapter, PythonAdapter, RustAdapter};

    fn python(content: &str) -> SourceFile {
        let mut file = PythonAdapter::new().unwrap().parse(content, "m.py").unwrap();
        enrich(&mut file);
        file
    }

    fn unit<'a>(file: &'a SourceFile, name: &str) -> &'a crate::types::SourceUnit {
        file.units.iter().find(|u| u.name == name).unwrap()
    }

    #[test]
    fn test_call_edges() {
        let file = python(
            "def helper(x):\n    return x\n\ndef main():\n    helper(1)\n    print(2)\n    main()\n",
        );
        let main = unit(&file, "main");
        assert!(main.has_signal(&Signal::Calls("helper".into())));
        assert!(!main.has_signal(&Signal::Calls("main".into())));
        assert!(!main.has_signal(&Signal::Calls("print".into())));
        assert!(unit(&file, "helper").has_signal(&Signal::CalledBy("main".into())));
    }

    #[test]
    fn test_strategy_and_factory() {
        let file = python(
            r#"class Shape:
    pass

class Circle(Shape):
    pass

class Square(Shape):
    pass

def make(kind):
    if kind == "c":
        return Circle()
    return Square()
"#,
        );
        for name in ["Shape", "Circle", "Square"] {
            assert!(unit(&file, name).has_signal(&Signal::Strategy), "{}", name);
        }
        assert!(unit(&file, "make").has_signal(&Signal::Factory));
    }

    #[test]
    fn test_single_implementor_is_not_strategy() {
        let file = python("class Base:\n    pass\n\nclass Only(Base):\n    pass\n");
        assert!(!unit(&file, "Base").has_signal(&Signal::Strategy));
    }

    #[test]
    fn test_observer_and_singleton() {
        let file = python(
            r#"class Bus:
    def subscribe(self, fn):
        pass

    def notify_all(self):
        pass

class Registry:
    @classmethod
    def get_instance(cls):
        pass
"#,
        );
        assert!(unit(&file, "Bus").has_signal(&Signal::Observer));
        assert!(unit(&file, "Registry").has_signal(&Signal::Singleton));
        assert!(!unit(&file, "Bus").has_signal(&Signal::Singleton));
    }

    #[test]
    fn test_builder_pair_in_rust() {
        let mut file = RustAdapter::new()
            .unwrap()
            .parse(
                "pub struct Request;\npub struct RequestBuilder;\nimpl RequestBuilder {\n    pub fn build(self) -> Request { Request }\n}\n",
                "src/req.rs",
            )
            .unwrap();
        enrich(&mut file);
        assert!(unit(&file, "Request").has_signal(&Signal::Builder));
        assert!(unit(&file, "RequestBuilder").has_signal(&Signal::Builder));
    }

    #[test]
    fn test_pass_is_additive_and_deterministic() {
        let source = "def a():\n    b()\n\ndef b():\n    pass\n";
        let parsed = PythonAdapter::new().unwrap().parse(source, "m.py").unwrap();
        let ids: Vec<_> = parsed.units.iter().map(|u| u.id.clone()).collect();

        let mut first = parsed.clone();
        enrich(&mut first);
        let mut second = parsed.clone();
        enrich(&mut second);

        assert_eq!(first, second);
        assert_eq!(first.units.iter().map(|u| u.id.clone()).collect::<Vec<_>>(), ids);
        for (before, after) in parsed.units.iter().zip(&first.units) {
            assert!(before.signals.is_subset(&after.signals));
        }
    }
}
