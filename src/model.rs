//! What the checker knows about the scripting runtime.
//!
//! Scripts talk to the runtime through a global controls table and through
//! socket objects. Rather than hard-coding those names, analysis receives a
//! [`RuntimeModel`] and derives an [`ObjectTable`] from the script: for every
//! object path it records how the object was bound and which capabilities
//! (properties and methods) the script uses on it.

use crate::syntax::ast::{Block, Expr, ExprKind, StmtKind};
use crate::syntax::visit;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

/// Names the runtime exposes to scripts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeModel {
    /// Global table holding every named control.
    pub controls_table: String,
    /// Property that receives the change-notification handler.
    pub handler_property: String,
    /// Property that receives payload callbacks on sockets.
    pub data_property: String,
    /// Dotted constructor paths that produce socket objects.
    pub socket_constructors: Vec<String>,
    /// Table holding the socket event constants.
    pub socket_events: String,
}

impl Default for RuntimeModel {
    fn default() -> Self {
        Self {
            controls_table: "Controls".into(),
            handler_property: "EventHandler".into(),
            data_property: "Data".into(),
            socket_constructors: vec!["TcpSocket.New".into()],
            socket_events: "TcpSocket.Events".into(),
        }
    }
}

/// Events delivered to a socket's event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SocketEvent {
    Connected,
    Reconnect,
    Data,
    Closed,
    Error,
    Timeout,
}

impl SocketEvent {
    pub const ALL: [SocketEvent; 6] = [
        SocketEvent::Connected,
        SocketEvent::Reconnect,
        SocketEvent::Data,
        SocketEvent::Closed,
        SocketEvent::Error,
        SocketEvent::Timeout,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SocketEvent::Connected => "Connected",
            SocketEvent::Reconnect => "Reconnect",
            SocketEvent::Data => "Data",
            SocketEvent::Closed => "Closed",
            SocketEvent::Error => "Error",
            SocketEvent::Timeout => "Timeout",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    /// Lifecycle events are everything except payload delivery.
    pub fn is_lifecycle(self) -> bool {
        self != SocketEvent::Data
    }

    /// Recognises `TcpSocket.Events.Data`-style constants and bare `"Data"`
    /// string comparisons.
    pub fn from_expr(expr: &Expr, model: &RuntimeModel) -> Option<Self> {
        let expr = expr.strip_parens();
        if let ExprKind::Str(s) = &expr.kind {
            return Self::from_name(s);
        }
        let path = expr_path(expr)?;
        let event = path.strip_prefix(model.socket_events.as_str())?.strip_prefix('.')?;
        Self::from_name(event)
    }
}

/// A property or method the script uses on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Boolean,
    Value,
    Text,
    Position,
    Color,
    Legend,
    IsDisabled,
    Choices,
    EventChannel,
    DataChannel,
    Connect,
    Disconnect,
    Write,
    Read,
    IsConnected,
}

impl Capability {
    fn from_property(name: &str, model: &RuntimeModel) -> Option<Self> {
        if name == model.handler_property {
            return Some(Capability::EventChannel);
        }
        if name == model.data_property {
            return Some(Capability::DataChannel);
        }
        let cap = match name {
            "Boolean" => Capability::Boolean,
            "Value" => Capability::Value,
            "String" => Capability::Text,
            "Position" => Capability::Position,
            "Color" => Capability::Color,
            "Legend" => Capability::Legend,
            "IsDisabled" => Capability::IsDisabled,
            "Choices" => Capability::Choices,
            "IsConnected" => Capability::IsConnected,
            _ => return None,
        };
        Some(cap)
    }

    fn from_method(name: &str) -> Option<Self> {
        let cap = match name {
            "Connect" => Capability::Connect,
            "Disconnect" => Capability::Disconnect,
            "Write" => Capability::Write,
            "Read" | "ReadLine" | "Search" => Capability::Read,
            _ => return None,
        };
        Some(cap)
    }

    fn implies(self) -> ObjectKind {
        match self {
            Capability::Boolean
            | Capability::Value
            | Capability::Text
            | Capability::Position
            | Capability::Color
            | Capability::Legend
            | Capability::IsDisabled
            | Capability::Choices => ObjectKind::Control,
            Capability::DataChannel
            | Capability::Connect
            | Capability::Disconnect
            | Capability::Write
            | Capability::Read
            | Capability::IsConnected => ObjectKind::Socket,
            Capability::EventChannel => ObjectKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Control,
    Socket,
    Unknown,
}

/// Object kinds and capability sets inferred from one script.
#[derive(Debug, Default)]
pub struct ObjectTable {
    bindings: HashMap<String, ObjectKind>,
    capabilities: HashMap<String, BTreeSet<Capability>>,
    controls_table: String,
}

impl ObjectTable {
    pub fn infer(chunk: &Block, model: &RuntimeModel) -> Self {
        let mut table = ObjectTable {
            controls_table: model.controls_table.clone(),
            ..Default::default()
        };

        let mut scopes = vec![chunk];
        visit::for_each_function(chunk, &mut |func| scopes.push(&func.body));

        for scope in &scopes {
            visit::for_each_stmt(scope, &mut |stmt| match &stmt.kind {
                StmtKind::Local { names, values } => {
                    for (name, value) in names.iter().zip(values) {
                        table.bind(&name.text, value, model);
                    }
                }
                StmtKind::Assign { targets, values } => {
                    for (target, value) in targets.iter().zip(values) {
                        if let Some(path) = expr_path(target) {
                            table.bind(&path, value, model);
                        }
                    }
                }
                StmtKind::GenericFor { vars, iter, .. } => {
                    // for _, ctl in ipairs(Controls.Inputs) do
                    let over_controls = iter.first().and_then(iterated_table).is_some_and(|t| {
                        root_name(t) == Some(model.controls_table.as_str())
                    });
                    if over_controls {
                        if let Some(value_var) = vars.get(1) {
                            table
                                .bindings
                                .insert(value_var.text.clone(), ObjectKind::Control);
                        }
                    }
                }
                _ => {}
            });
        }

        for scope in &scopes {
            visit::for_each_expr(scope, &mut |expr| {
                let (obj, cap) = match &expr.kind {
                    ExprKind::MethodCall { obj, method, .. } => {
                        (&**obj, Capability::from_method(&method.text))
                    }
                    _ => match expr.property() {
                        Some((obj, prop)) => (obj, Capability::from_property(prop, model)),
                        None => return,
                    },
                };
                if let (Some(path), Some(cap)) = (expr_path(obj), cap) {
                    table.capabilities.entry(path).or_default().insert(cap);
                }
            });
        }

        table
    }

    fn bind(&mut self, path: &str, value: &Expr, model: &RuntimeModel) {
        let value = value.strip_parens();
        let kind = match &value.kind {
            ExprKind::Call { func, .. } => expr_path(func)
                .filter(|f| model.socket_constructors.iter().any(|c| c == f))
                .map(|_| ObjectKind::Socket),
            _ => {
                if self.is_control_path(value) {
                    Some(ObjectKind::Control)
                } else {
                    expr_path(value).and_then(|p| self.bindings.get(&p).copied())
                }
            }
        };
        if let Some(kind) = kind {
            self.bindings.insert(path.to_string(), kind);
        }
    }

    fn is_control_path(&self, expr: &Expr) -> bool {
        matches!(expr.kind, ExprKind::Field { .. } | ExprKind::Index { .. })
            && root_name(expr) == Some(self.controls_table.as_str())
    }

    /// Kind of the object an expression evaluates to.
    pub fn kind_of(&self, expr: &Expr) -> ObjectKind {
        let expr = expr.strip_parens();
        if self.is_control_path(expr) {
            return ObjectKind::Control;
        }
        let Some(path) = expr_path(expr) else {
            return ObjectKind::Unknown;
        };
        if let Some(kind) = self.bindings.get(&path) {
            return *kind;
        }
        let caps = match self.capabilities.get(&path) {
            Some(caps) => caps,
            None => return ObjectKind::Unknown,
        };
        if caps.iter().any(|c| c.implies() == ObjectKind::Socket) {
            ObjectKind::Socket
        } else if caps.iter().any(|c| c.implies() == ObjectKind::Control) {
            ObjectKind::Control
        } else {
            ObjectKind::Unknown
        }
    }

    pub fn capabilities(&self, path: &str) -> Option<&BTreeSet<Capability>> {
        self.capabilities.get(path)
    }
}

/// `ipairs(t)` / `pairs(t)` → `t`.
fn iterated_table(expr: &Expr) -> Option<&Expr> {
    match &expr.kind {
        ExprKind::Call { func, args } if matches!(func.as_name(), Some("ipairs" | "pairs")) => {
            args.first()
        }
        _ => None,
    }
}

/// Name at the root of a field/index chain.
pub fn root_name(expr: &Expr) -> Option<&str> {
    match &expr.kind {
        ExprKind::Name(n) => Some(n),
        ExprKind::Field { obj, .. } | ExprKind::Index { obj, .. } => root_name(obj),
        ExprKind::Paren(inner) => root_name(inner),
        _ => None,
    }
}

/// Canonical text of a name/field/index chain: `Controls["Mute"]` and
/// `Controls.Mute` both become `Controls.Mute`. Returns `None` for anything
/// that is not a plain access path.
pub fn expr_path(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Name(n) => Some(n.clone()),
        ExprKind::Paren(inner) => expr_path(inner),
        ExprKind::Field { obj, name } => Some(format!("{}.{}", expr_path(obj)?, name.text)),
        ExprKind::Index { obj, key } => {
            let base = expr_path(obj)?;
            match &key.kind {
                ExprKind::Str(s) if is_identifier(s) => Some(format!("{}.{}", base, s)),
                ExprKind::Str(s) => Some(format!("{}[{:?}]", base, s)),
                ExprKind::Number(n) => Some(format!("{}[{}]", base, n)),
                ExprKind::Name(n) => Some(format!("{}[{}]", base, n)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse_chunk;

    fn first_value(src: &str) -> Expr {
        let block = parse_chunk(src).unwrap();
        match block.stmts.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Assign { mut values, .. }) => values.remove(0),
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    fn kind_in(src: &str, expr: &str) -> ObjectKind {
        let block = parse_chunk(src).unwrap();
        let table = ObjectTable::infer(&block, &RuntimeModel::default());
        table.kind_of(&first_value(&format!("x = {}", expr)))
    }

    #[test]
    fn paths_are_normalised() {
        assert_eq!(
            expr_path(&first_value("x = Controls['Mute']")).as_deref(),
            Some("Controls.Mute")
        );
        assert_eq!(
            expr_path(&first_value("x = Controls.Inputs[3]")).as_deref(),
            Some("Controls.Inputs[3]")
        );
        assert_eq!(
            expr_path(&first_value("x = t['two words']")).as_deref(),
            Some("t[\"two words\"]")
        );
        assert_eq!(expr_path(&first_value("x = f()")), None);
    }

    #[test]
    fn controls_table_paths_are_controls() {
        assert_eq!(kind_in("", "Controls.Mute"), ObjectKind::Control);
        assert_eq!(kind_in("", "Controls.Inputs[i]"), ObjectKind::Control);
        assert_eq!(kind_in("", "Controls"), ObjectKind::Unknown);
    }

    #[test]
    fn aliases_follow_bindings() {
        let src = "local mute = Controls.Mute\nlocal m2 = mute";
        assert_eq!(kind_in(src, "mute"), ObjectKind::Control);
        assert_eq!(kind_in(src, "m2"), ObjectKind::Control);
    }

    #[test]
    fn socket_constructor_binds_socket() {
        let src = "sock = TcpSocket.New()";
        assert_eq!(kind_in(src, "sock"), ObjectKind::Socket);
    }

    #[test]
    fn loop_over_controls_binds_value_variable() {
        let src = "for i, ctl in ipairs(Controls.Inputs) do end";
        assert_eq!(kind_in(src, "ctl"), ObjectKind::Control);
        assert_eq!(kind_in(src, "i"), ObjectKind::Unknown);
    }

    #[test]
    fn capabilities_decide_unbound_objects() {
        let src = "print(btn.Boolean)\nconn:Write('x')\ntimer:Start(1)";
        assert_eq!(kind_in(src, "btn"), ObjectKind::Control);
        assert_eq!(kind_in(src, "conn"), ObjectKind::Socket);
        assert_eq!(kind_in(src, "timer"), ObjectKind::Unknown);
    }

    #[test]
    fn capability_sets_are_recorded() {
        let block = parse_chunk("s.Data = f\ns:Connect(ip, 23)").unwrap();
        let table = ObjectTable::infer(&block, &RuntimeModel::default());
        let caps = table.capabilities("s").unwrap();
        assert!(caps.contains(&Capability::DataChannel));
        assert!(caps.contains(&Capability::Connect));
    }

    #[test]
    fn custom_controls_table() {
        let model = RuntimeModel {
            controls_table: "Ctl".into(),
            ..Default::default()
        };
        let block = parse_chunk("").unwrap();
        let table = ObjectTable::infer(&block, &model);
        assert_eq!(table.kind_of(&first_value("x = Ctl.A")), ObjectKind::Control);
        assert_eq!(table.kind_of(&first_value("x = Controls.A")), ObjectKind::Unknown);
    }

    #[test]
    fn socket_events_from_constants_and_strings() {
        let model = RuntimeModel::default();
        assert_eq!(
            SocketEvent::from_expr(&first_value("x = TcpSocket.Events.Data"), &model),
            Some(SocketEvent::Data)
        );
        assert_eq!(
            SocketEvent::from_expr(&first_value("x = 'Closed'"), &model),
            Some(SocketEvent::Closed)
        );
        assert_eq!(
            SocketEvent::from_expr(&first_value("x = TcpSocket.EventsX.Data"), &model),
            None
        );
        assert_eq!(SocketEvent::from_expr(&first_value("x = 'Nope'"), &model), None);
        assert!(!SocketEvent::Data.is_lifecycle());
    }
}
