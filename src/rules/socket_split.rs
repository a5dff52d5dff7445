use crate::model::{expr_path, ObjectKind, SocketEvent};
use crate::rules::shape::{all_statements, function_definitions, same_shape};
use crate::rules::{CheckContext, Match, Matcher, RuleEvaluationError, RuleId};
use crate::syntax::ast::{BinOp, Expr, ExprKind, FuncBody, Stmt, StmtKind};
use crate::syntax::span::Span;
use crate::syntax::visit;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Flags socket objects whose connection-lifecycle handler also deals with
/// incoming payload.
///
/// Two shapes are recognised: one function bound to both the event and the
/// data channel, and an event handler that branches on the `Data` event.
#[derive(Debug, Default)]
pub struct SocketSplitMatcher;

struct Channels<'a> {
    event: Option<(&'a Stmt, &'a Expr)>,
    data: Option<(&'a Stmt, &'a Expr)>,
}

impl Matcher for SocketSplitMatcher {
    fn rule(&self) -> RuleId {
        RuleId::SocketEventDataConflation
    }

    fn check(&self, ctx: &CheckContext) -> Result<Vec<Match>, RuleEvaluationError> {
        let rule = self.rule();
        let model = ctx.model;
        let definitions = function_definitions(ctx.chunk);

        let mut order = Vec::new();
        let mut objects: HashMap<String, Channels> = HashMap::new();
        for stmt in all_statements(ctx.chunk) {
            let StmtKind::Assign { targets, values } = &stmt.kind else {
                continue;
            };
            for (target, value) in targets.iter().zip(values) {
                let Some((obj, prop)) = target.property() else {
                    continue;
                };
                if ctx.objects.kind_of(obj) != ObjectKind::Socket {
                    continue;
                }
                let Some(path) = expr_path(obj) else {
                    continue;
                };
                let channels = objects.entry(path.clone()).or_insert_with(|| {
                    order.push((path, obj));
                    Channels {
                        event: None,
                        data: None,
                    }
                });
                if prop == model.handler_property {
                    channels.event = Some((stmt, value));
                } else if prop == model.data_property {
                    channels.data = Some((stmt, value));
                }
            }
        }

        let mut matches = Vec::new();
        let mut reported: HashSet<Span> = HashSet::new();
        for (path, obj) in &order {
            let Some(channels) = objects.get(path) else {
                continue;
            };
            let obj_text = ctx.text(rule, obj.span)?;

            if let (Some((event_stmt, event)), Some((data_stmt, data))) =
                (channels.event, channels.data)
            {
                if same_shape(event, data) {
                    let later = if data_stmt.span.start > event_stmt.span.start {
                        data_stmt
                    } else {
                        event_stmt
                    };
                    reported.insert(later.span);
                    reported.insert(event_stmt.span);
                    matches.push(Match {
                        rule,
                        span: later.span,
                        message: format!(
                            "`{}` is bound to both `{}.{}` and `{}.{}`",
                            ctx.text(rule, event.span)?,
                            obj_text,
                            model.handler_property,
                            obj_text,
                            model.data_property
                        ),
                        suggestion: Some(split_suggestion(obj_text, ctx)),
                        fix: None,
                    });
                }
            }

            let Some((stmt, handler)) = channels.event else {
                continue;
            };
            if reported.contains(&stmt.span) {
                continue;
            }
            let func = match &handler.strip_parens().kind {
                ExprKind::Function(func) => Some(&**func),
                _ => expr_path(handler).and_then(|p| definitions.get(&p).copied()),
            };
            let Some(func) = func else {
                continue;
            };
            let events = compared_events(func, ctx);
            if !events.contains(&SocketEvent::Data) {
                continue;
            }
            let lifecycle: Vec<&str> = events
                .iter()
                .filter(|e| e.is_lifecycle())
                .map(|e| e.name())
                .collect();
            let message = if lifecycle.is_empty() {
                format!("event handler of `{}` handles the `Data` event", obj_text)
            } else {
                format!(
                    "event handler of `{}` handles the `Data` event alongside {}",
                    obj_text,
                    lifecycle.join(", ")
                )
            };
            matches.push(Match {
                rule,
                span: stmt.span,
                message,
                suggestion: Some(split_suggestion(obj_text, ctx)),
                fix: None,
            });
        }

        Ok(matches)
    }
}

fn split_suggestion(obj: &str, ctx: &CheckContext) -> String {
    format!(
        "read payload in a dedicated `{}.{}` handler and keep `{}.{}` for connection events",
        obj, ctx.model.data_property, obj, ctx.model.handler_property
    )
}

/// Socket events the handler compares its event argument against.
fn compared_events(func: &FuncBody, ctx: &CheckContext) -> BTreeSet<SocketEvent> {
    let mut events = BTreeSet::new();
    let Some(param) = func.params.get(1) else {
        return events;
    };
    let is_param = |e: &Expr| e.strip_parens().as_name() == Some(param.text.as_str());
    visit::for_each_expr(&func.body, &mut |expr| {
        let ExprKind::Binary { op, lhs, rhs } = &expr.kind else {
            return;
        };
        if !matches!(op, BinOp::Eq | BinOp::Ne) {
            return;
        }
        let other = if is_param(lhs) {
            rhs
        } else if is_param(rhs) {
            lhs
        } else {
            return;
        };
        if let Some(event) = SocketEvent::from_expr(other, ctx.model) {
            events.insert(event);
        }
    });
    events
}
