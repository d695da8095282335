use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use githook_core::{normalize_tenant, Event, MatchedRule, Rule, GLOBAL_TENANT};
use tracing::debug;

use crate::compiler::{compile, CompiledExpr};
use crate::error::{CompileError, EvalError};
use crate::eval::{eval, truthy, MissingPolicy};
use crate::resolve::resolve_variables;

struct CompiledRule {
    matched: MatchedRule,
    when: CompiledExpr,
}

/// The compiled rule set for one tenant, swapped in atomically on reload
/// (spec §4.3 "rule updates take effect without restarting the service").
/// `strict` is the per-tenant flag set by the `Update` call that produced
/// this snapshot (GLOSSARY "Strict mode").
struct TenantSnapshot {
    rules: Vec<CompiledRule>,
    strict: bool,
}

/// Hot-reloadable, per-tenant compiled rule set. Reads (`evaluate`) never
/// block on writes (`update`): each tenant's rule list lives behind its own
/// `Arc`, and the whole map is replaced via `ArcSwap` copy-on-write (spec §9
/// design note on snapshot isolation between concurrent reload and
/// evaluation).
pub struct RuleEngine {
    tenants: ArcSwap<HashMap<String, Arc<TenantSnapshot>>>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            tenants: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Recompile and atomically install a tenant's rule set (spec §4.3
    /// `Update(rules, strict, tenant_id, logger)`). An empty `rules` list
    /// removes the tenant's slot entirely, falling back to the global rule
    /// set for subsequent evaluations (spec §3 "blank tenant collapses to
    /// the global bucket"). `strict` requires every JSONPath variable in
    /// this tenant's rules to resolve before a rule may match; otherwise
    /// missing variables evaluate to `null`.
    pub fn update(&self, tenant_id: &str, rules: &[Rule], strict: bool) -> Result<(), CompileError> {
        let tenant = normalize_tenant(tenant_id);
        let mut compiled = Vec::new();
        for rule in rules {
            let when = compile(&rule.when)?;
            for matched in rule.to_matches() {
                compiled.push(CompiledRule {
                    matched,
                    when: when.clone(),
                });
            }
        }
        let current = self.tenants.load();
        let mut next = HashMap::clone(&**current);
        if compiled.is_empty() {
            next.remove(&tenant);
        } else {
            next.insert(
                tenant.clone(),
                Arc::new(TenantSnapshot {
                    rules: compiled,
                    strict,
                }),
            );
        }
        debug!(tenant = %tenant, rule_count = rules.len(), strict, "rule engine snapshot updated");
        self.tenants.store(Arc::new(next));
        Ok(())
    }

    /// Evaluate every rule for `event.tenant_id` (falling back to the global
    /// bucket when the tenant has no snapshot of its own) and return the
    /// matches whose `when` evaluated true. A strict-mode rule whose `when`
    /// references a variable this event never populates is skipped — it
    /// never matches, but its siblings are still evaluated and a genuinely
    /// malformed rule (bad JSONPath, type mismatch) still fails the call.
    pub fn evaluate(&self, event: &mut Event) -> Result<Vec<MatchedRule>, EvalError> {
        let tenant = normalize_tenant(&event.tenant_id);
        let tenants = self.tenants.load();
        let snapshot = tenants.get(&tenant).or_else(|| tenants.get(GLOBAL_TENANT));
        let Some(snapshot) = snapshot else {
            return Ok(Vec::new());
        };
        let policy = if snapshot.strict {
            MissingPolicy::Strict
        } else {
            MissingPolicy::Lenient
        };
        let mut matches = Vec::new();
        for rule in &snapshot.rules {
            let resolved = resolve_variables(event, &rule.when.variables)?;
            let value = match eval(&rule.when.ast, &resolved, policy) {
                Ok(value) => value,
                // Strict mode: a rule referencing a variable this event never
                // populates is skipped, not fatal — it just never matches
                // (spec §4.3 "skipped (not evaluated)"). The rest of the
                // tenant's rule set still runs.
                Err(EvalError::MissingVariable(_)) => continue,
                Err(e) => return Err(e),
            };
            if truthy(&value) {
                matches.push(rule.matched.clone());
            }
        }
        Ok(matches)
    }
}
