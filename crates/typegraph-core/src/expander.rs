//! Reachability expansion.
//!
//! Walks the type table from the contract roots and resolves every ID that is
//! referenced but not yet present, so the final table is closed: each
//! non-primitive ID mentioned anywhere has an entry. Interfaces get their
//! method signatures here.

use crate::resolver::Resolver;
use std::collections::HashSet;
use tracing::{debug, warn};
use typegraph_model::{is_primitive, Contract, Project};

/// Type IDs used directly by the contracts.
pub fn root_ids(contracts: &[Contract]) -> Vec<String> {
    let mut roots = Vec::new();
    for contract in contracts {
        for method in &contract.methods {
            for slot in method.args.iter().chain(method.results.iter()) {
                roots.extend(slot.referenced_ids().map(str::to_string));
            }
            roots.extend(method.errors.iter().map(|e| e.type_id.clone()));
        }
        roots.extend(contract.implementations.iter().map(|i| i.type_id.clone()));
    }
    roots
}

/// Close the type table over everything reachable from `contracts`. Returns
/// the number of types resolved during the walk.
pub fn expand(resolver: &mut Resolver<'_>, contracts: &[Contract]) -> usize {
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = Vec::new();
    for id in root_ids(contracts) {
        if visited.insert(id.clone()) {
            stack.push(id);
        }
    }

    let mut resolved = 0;
    while let Some(id) = stack.pop() {
        if is_primitive(&id) {
            continue;
        }
        if !resolver.types().contains_key(&id) {
            if resolver.resolve_id(&id).is_none() {
                warn!(type_id = %id, "referenced type could not be resolved");
                continue;
            }
            resolved += 1;
        }
        resolver.resolve_interface_methods(&id);

        let Some(ty) = resolver.types().get(&id) else {
            continue;
        };
        let next: Vec<String> = ty
            .referenced_ids()
            .into_iter()
            .filter(|r| !visited.contains(*r))
            .map(str::to_string)
            .collect();
        for r in next {
            if visited.insert(r.clone()) {
                stack.push(r);
            }
        }
    }

    debug!(visited = visited.len(), resolved, "expanded type graph");
    resolved
}

/// IDs referenced somewhere in `project` but missing from its table.
pub fn check_closure(project: &Project) -> Vec<String> {
    project.dangling_type_ids()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::ExclusionPolicy;
    use crate::loader::PackageCache;
    use typegraph_model::{Method, Variable};

    #[test]
    fn test_expansion_closes_the_table() {
        let cache = PackageCache::from_sources(
            "shop",
            &[(
                "model",
                r#"
                pub struct Order { pub lines: Vec<Line>, pub notify: Box<dyn Notifier> }
                pub struct Line { pub sku: String }
                pub trait Notifier { fn notify(&self, order: &Order) -> bool; }
                "#,
            )],
        )
        .unwrap();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        let contracts = vec![Contract {
            name: "Orders".into(),
            methods: vec![Method {
                name: "get".into(),
                results: vec![Variable {
                    type_id: "shop::model:Order".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }];

        assert_eq!(expand(&mut resolver, &contracts), 1);
        let types = resolver.types();
        assert!(types.contains_key("shop::model:Line"));
        let notifier = &types["shop::model:Notifier"];
        assert_eq!(notifier.methods.len(), 1);
        assert_eq!(notifier.methods[0].args[0].pointers, 1);

        let mut project = Project::new("shop");
        project.contracts = contracts;
        project.types = resolver.into_types();
        assert!(check_closure(&project).is_empty());
    }

    #[test]
    fn test_unresolvable_root_stays_dangling() {
        let cache = PackageCache::from_sources("shop", &[("model", "pub struct Item;")]).unwrap();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        let contracts = vec![Contract {
            implementations: vec![typegraph_model::Implementation {
                type_id: "shop::model:Ghost".into(),
                ..Default::default()
            }],
            ..Default::default()
        }];
        assert_eq!(expand(&mut resolver, &contracts), 0);
        let mut project = Project::new("shop");
        project.contracts = contracts;
        project.types = resolver.into_types();
        assert_eq!(check_closure(&project), vec!["shop::model:Ghost".to_string()]);
    }
}
