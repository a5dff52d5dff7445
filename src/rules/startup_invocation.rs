use crate::model::{expr_path, ObjectKind};
use crate::rules::shape::{call_sites, function_definitions, scopes};
use crate::rules::{CheckContext, Fix, Match, Matcher, RuleEvaluationError, RuleId};
use crate::syntax::ast::{ExprKind, StmtKind};
use crate::syntax::span::Span;
use crate::syntax::visit;

/// Flags a handler bound to a control's event-handler property that is never
/// called afterwards in the same scope, by name or through the property.
///
/// Without the startup call, whatever the handler derives from the control's
/// state stays stale until the control first changes.
#[derive(Debug, Default)]
pub struct StartupInvocationMatcher;

impl Matcher for StartupInvocationMatcher {
    fn rule(&self) -> RuleId {
        RuleId::MissingStartupInvocation
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<Match>, RuleEvaluationError> {
        let rule = self.rule();
        let handler_property = ctx.model.handler_property.as_str();
        let definitions = function_definitions(ctx.chunk);
        let mut matches = Vec::new();

        for scope in scopes(ctx.chunk) {
            let calls = call_sites(scope);
            let mut bindings = Vec::new();
            visit::for_each_stmt(scope, &mut |stmt| {
                if let StmtKind::Assign { targets, values } = &stmt.kind {
                    for (target, value) in targets.iter().zip(values) {
                        bindings.push((stmt, target, value));
                    }
                }
            });

            for (stmt, target, value) in bindings {
                let Some((obj, prop)) = target.property() else {
                    continue;
                };
                if prop != handler_property || ctx.objects.kind_of(obj) != ObjectKind::Control {
                    continue;
                }
                let value = value.strip_parens();
                let property_path = expr_path(target);
                // Named handlers may be called by name; anonymous ones only
                // through the property they were bound to.
                let (handler, func) = match &value.kind {
                    ExprKind::Function(func) => (None, &**func),
                    _ => {
                        let Some(handler) = expr_path(value) else {
                            continue;
                        };
                        let Some(func) = definitions.get(&handler) else {
                            continue;
                        };
                        (Some(handler), *func)
                    }
                };
                let invoked = calls.iter().any(|(offset, callee)| {
                    *offset >= stmt.span.end
                        && (Some(callee) == handler.as_ref()
                            || Some(callee) == property_path.as_ref())
                });
                if invoked {
                    continue;
                }

                let obj_text = ctx.text(rule, obj.span)?;
                let callee = match handler {
                    Some(_) => ctx.text(rule, value.span)?,
                    None => ctx.text(rule, target.span)?,
                };
                let call = if func.params.is_empty() && !func.vararg {
                    format!("{}()", callee)
                } else {
                    format!("{}({})", callee, obj_text)
                };
                let message = match handler {
                    Some(_) => format!(
                        "`{}` handles changes to `{}` but is never called at startup",
                        callee, obj_text
                    ),
                    None => format!(
                        "the handler bound to `{}` is never called at startup",
                        callee
                    ),
                };
                let indent = ctx.source.indent_at(stmt.span.start);
                let newline = ctx.source.line_ending_at(stmt.span.end);
                matches.push(Match {
                    rule,
                    span: stmt.span,
                    message,
                    suggestion: Some(format!("call `{}` right after binding it", call)),
                    fix: Some(Fix {
                        span: Span::new(stmt.span.end, stmt.span.end),
                        replacement: format!("{}{}{}", newline, indent, call),
                    }),
                });
            }
        }

        Ok(matches)
    }
}
