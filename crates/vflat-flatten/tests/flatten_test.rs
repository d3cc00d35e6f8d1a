//! End-to-end tests for the flattening engine

use std::collections::HashSet;
use vflat_ast::{
    Ast, AstNode, DimensionLayout, FlattenHint, NodeId, NodeKind, PortDirection, SourceSpan,
};
use vflat_flatten::*;

/// Small builder for unit trees
struct Design {
    ast: Ast,
    folder: ConstFolder,
    config: FlattenConfig,
}

impl Design {
    fn new() -> Self {
        Self {
            ast: Ast::new(),
            folder: ConstFolder::new(),
            config: FlattenConfig::default(),
        }
    }

    fn ranges(&mut self, bounds: &[(i64, i64)]) -> Vec<NodeId> {
        bounds
            .iter()
            .map(|&(l, r)| make_range(&mut self.ast, l, r))
            .collect()
    }

    fn wire(&mut self, name: &str, packed: &[(i64, i64)], unpacked: &[(i64, i64)]) -> NodeId {
        let mut node = AstNode::named(NodeKind::Wire, name);
        node.packed = self.ranges(packed);
        node.unpacked = self.ranges(unpacked);
        self.ast.alloc(node)
    }

    fn item(&mut self, name: &str, width: i64) -> NodeId {
        let mut node = AstNode::named(NodeKind::StructItem, name);
        node.packed = self.ranges(&[(width - 1, 0)]);
        self.ast.alloc(node)
    }

    fn indexed(&mut self, name: &str, idx: &[i64]) -> NodeId {
        let sels = idx
            .iter()
            .map(|&i| {
                let c = self.ast.constant(i);
                self.ast.bit_select(c)
            })
            .collect();
        self.ast.identifier(name, sels)
    }

    fn assign(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.ast
            .alloc(AstNode::new(NodeKind::AssignLe).with_children(vec![lhs, rhs]))
    }

    fn unit(&mut self, kind: NodeKind, name: &str, children: Vec<NodeId>) -> NodeId {
        self.ast.alloc(AstNode::named(kind, name).with_children(children))
    }

    fn design(&mut self, units: Vec<NodeId>) -> NodeId {
        self.ast
            .alloc(AstNode::new(NodeKind::Design).with_children(units))
    }

    fn flatten(&mut self, root: NodeId) -> FlattenReport {
        flatten_design(&mut self.ast, root, &self.folder, &self.config)
    }

    fn bounds(&self, access: NodeId) -> Option<(i64, i64)> {
        self.ast.const_bounds(self.ast[access].children[0])
    }

    fn layout(&self, decl: NodeId) -> &DimensionLayout {
        self.ast[decl].layout().expect("declaration is normalized")
    }
}

#[test]
fn test_flatten_is_idempotent() {
    let mut d = Design::new();
    let w = d.wire("w", &[(3, 0), (1, 0)], &[(0, 2)]);
    let mem = d.wire("mem", &[(7, 0)], &[(0, 15)]);
    let lhs = d.indexed("w", &[2, 1]);
    let rhs = d.indexed("mem", &[3]);
    let stmt = d.assign(lhs, rhs);
    let top = d.unit(NodeKind::Module, "top", vec![w, mem, stmt]);
    let root = d.design(vec![top]);

    let first = d.flatten(root);
    assert!(first.is_clean());
    assert_eq!(first.stats.flattened, 1);
    assert_eq!(first.stats.memories, 1);
    let layout = d.layout(w).clone();
    let snapshot = serde_json::to_value(&d.ast).unwrap();

    let second = d.flatten(root);
    assert!(second.is_clean());
    assert_eq!(second.stats, PassStats::default());
    assert_eq!(d.layout(w), &layout);
    assert_eq!(serde_json::to_value(&d.ast).unwrap(), snapshot);
}

#[test]
fn test_size_invariant_and_addressing() {
    let mut d = Design::new();
    // logic [2:1][0:3] w [1:0][4:2]
    let w = d.wire("w", &[(2, 1), (0, 3)], &[(1, 0), (4, 2)]);
    let top = d.unit(NodeKind::Module, "top", vec![w]);
    let root = d.design(vec![top]);
    d.flatten(root);

    let size = 2 * 4 * 2 * 3;
    assert_eq!(d.layout(w).total_size(), size);
    assert_eq!(d.ast.const_bounds(d.ast[w].packed[0]), Some((size - 1, 0)));

    let scope = ScopeTable::enter(top);
    let mut seen = HashSet::new();
    for u0 in 0..=1 {
        for u1 in 2..=4 {
            for p0 in 1..=2 {
                for p1 in 0..=3 {
                    let access = d.indexed("w", &[u0, u1, p0, p1]);
                    rewrite_access(&mut d.ast, access, w, &scope, &d.folder).unwrap();
                    let (high, low) = d.bounds(access).unwrap();
                    assert_eq!(high, low);
                    assert!((0..size).contains(&low));
                    assert!(seen.insert(low), "bit {} addressed twice", low);
                }
            }
        }
    }
    assert_eq!(seen.len() as i64, size);
}

#[test]
fn test_swapped_and_descending_boundaries() {
    let mut d = Design::new();
    let asc = d.wire("asc", &[(0, 7)], &[(0, 1)]);
    let desc = d.wire("desc", &[(7, 0)], &[(0, 1)]);
    d.ast[asc].hint = FlattenHint::Force;
    d.ast[desc].hint = FlattenHint::Force;
    let a0 = d.indexed("asc", &[0, 0]);
    let a7 = d.indexed("asc", &[0, 7]);
    let d0 = d.indexed("desc", &[0, 0]);
    let d7 = d.indexed("desc", &[0, 7]);
    let s1 = d.assign(a0, d0);
    let s2 = d.assign(a7, d7);
    let top = d.unit(NodeKind::Module, "top", vec![asc, desc, s1, s2]);
    let root = d.design(vec![top]);

    let report = d.flatten(root);
    assert!(report.is_clean());
    // element 0 is the upper byte of both
    assert_eq!(d.bounds(a0), Some((15, 15)));
    assert_eq!(d.bounds(a7), Some((8, 8)));
    assert_eq!(d.bounds(d0), Some((8, 8)));
    assert_eq!(d.bounds(d7), Some((15, 15)));
}

#[test]
fn test_packed_2d_scenario() {
    let mut d = Design::new();
    let w = d.wire("w", &[(1, 0), (3, 0)], &[]);
    let access = d.indexed("w", &[1, 2]);
    let rhs = d.ast.constant(0);
    let stmt = d.assign(access, rhs);
    let top = d.unit(NodeKind::Module, "top", vec![w, stmt]);
    let root = d.design(vec![top]);

    let report = d.flatten(root);
    assert_eq!(report.stats.rewritten, 1);
    assert_eq!(d.ast.const_bounds(d.ast[w].packed[0]), Some((7, 0)));
    assert_eq!(d.bounds(access), Some((6, 6)));
}

#[test]
fn test_nested_record_field() {
    let mut d = Design::new();
    // typedef struct packed { struct packed { logic [7:0] x, y; } a; logic [3:0] b; } pair_t;
    let x = d.item("x", 8);
    let y = d.item("y", 8);
    let a = d.ast.alloc(AstNode::named(NodeKind::Struct, "a").with_children(vec![x, y]));
    let b = d.item("b", 4);
    let body = d.ast.alloc(AstNode::new(NodeKind::Struct).with_children(vec![a, b]));
    let typedef = d.unit(NodeKind::Typedef, "pair_t", vec![body]);

    let ty = d.ast.alloc(AstNode::named(NodeKind::WireType, "pair_t"));
    let s = d.ast.alloc(AstNode::named(NodeKind::Wire, "s").with_children(vec![ty]));

    let y_dot = d.ast.alloc(AstNode::named(NodeKind::Dot, "y"));
    let a_dot = d.ast.alloc(AstNode::named(NodeKind::Dot, "a").with_children(vec![y_dot]));
    let access = d.ast.identifier("s", vec![a_dot]);
    let lhs = d.ast.identifier("out", vec![]);
    let stmt = d.assign(lhs, access);
    let top = d.unit(NodeKind::Module, "top", vec![typedef, s, stmt]);
    let root = d.design(vec![top]);

    let report = d.flatten(root);
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.stats.expanded, 1);
    assert_eq!(d.layout(s).record.as_ref().map(|r| r.width), Some(20));
    assert_eq!(d.bounds(access), Some((11, 4)));
    assert!(d.ast[access].is_prepared());
}

#[test]
fn test_memory_reclassification() {
    let mut d = Design::new();
    let mem = d.wire("mem", &[(7, 0)], &[(0, 15)]);
    let port = d.wire("port_mem", &[(7, 0)], &[(0, 15)]);
    d.ast[port].port = Some(PortDirection::Output);
    let top = d.unit(NodeKind::Module, "top", vec![mem, port]);
    let root = d.design(vec![top]);

    let report = d.flatten(root);
    assert_eq!(report.stats.memories, 1);
    assert_eq!(d.ast[mem].kind, NodeKind::Memory);
    assert_eq!(d.ast[mem].packed.len(), 1);
    assert_eq!(d.ast[mem].unpacked.len(), 1);
    assert_eq!(d.ast[port].kind, NodeKind::Wire);
    assert_eq!(d.layout(port).total_size(), 128);
}

#[test]
fn test_memory_checker_hints() {
    let mut d = Design::new();
    let whole = d.wire("whole", &[(7, 0)], &[(0, 3)]);
    let rom = d.wire("rom", &[(7, 0)], &[(0, 3)]);
    let lhs = d.ast.identifier("copy", vec![]);
    let rhs = d.ast.identifier("whole", vec![]);
    let stmt = d.assign(lhs, rhs);
    let file = d.ast.alloc(AstNode::new(NodeKind::Constant));
    let target = d.ast.identifier("rom", vec![]);
    let call = d.unit(NodeKind::TCall, "$readmemb", vec![file, target]);
    let init = d.unit(NodeKind::Initial, "", vec![call]);
    let top = d.unit(NodeKind::Module, "top", vec![whole, rom, stmt, init]);
    let root = d.design(vec![top]);

    let report = d.flatten(root);
    assert_eq!(report.memory_marks, MemoryMarks { forced: 1, preserved: 1 });
    assert_eq!(d.layout(whole).total_size(), 32);
    assert_eq!(d.ast[rom].kind, NodeKind::Memory);
    assert_eq!(d.ast[rom].hint, FlattenHint::Preserve);
}

#[test]
fn test_package_constants_imported() {
    let mut d = Design::new();
    let width = d.ast.constant(16);
    let param = d.unit(NodeKind::LocalParam, "WIDTH", vec![width]);
    let pkg_var = d.wire("pkg_state", &[], &[]);
    let pkg = d.unit(NodeKind::Package, "cfg_pkg", vec![param, pkg_var]);

    // logic [cfg_pkg::WIDTH-1:0][WIDTH/8-1:0] bus;
    let q = d.ast.identifier("cfg_pkg::WIDTH", vec![]);
    let one = d.ast.constant(1);
    let hi = d.ast.sub(q, one);
    let zero = d.ast.constant(0);
    let r0 = d.ast.range(hi, zero);
    let u = d.ast.identifier("WIDTH", vec![]);
    let eight = d.ast.constant(8);
    let div = d.ast.binary(NodeKind::Div, u, eight);
    let one = d.ast.constant(1);
    let hi = d.ast.sub(div, one);
    let zero = d.ast.constant(0);
    let r1 = d.ast.range(hi, zero);
    let mut bus = AstNode::named(NodeKind::Wire, "bus");
    bus.packed = vec![r0, r1];
    let bus = d.ast.alloc(bus);
    let top = d.unit(NodeKind::Module, "top", vec![bus]);
    let root = d.design(vec![top, pkg]);

    let report = d.flatten(root);
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(d.layout(bus).total_size(), 32);

    let mut scope = ScopeTable::enter(top);
    scope.import_package(&d.ast, pkg);
    assert!(scope.contains("cfg_pkg::WIDTH"));
    assert!(!scope.contains("pkg_state"));
}

#[test]
fn test_driver_continues_after_errors() {
    let mut d = Design::new();
    // module a: one bad declaration between two good ones
    let ok1 = d.wire("ok1", &[(1, 0), (1, 0)], &[]);
    let n = d.ast.identifier("UNDEFINED", vec![]);
    let zero = d.ast.constant(0);
    let bad_range = d.ast.range(n, zero);
    let mut bad = AstNode::named(NodeKind::Wire, "bad")
        .with_span(SourceSpan::at_line(7).with_file("a.sv"));
    bad.packed = vec![bad_range];
    bad.unpacked = d.ranges(&[(0, 1), (0, 1)]);
    let bad = d.ast.alloc(bad);
    let ok2 = d.wire("ok2", &[(1, 0), (1, 0)], &[]);
    let a = d.unit(NodeKind::Module, "a", vec![ok1, bad, ok2]);

    // module b: out-of-range access count
    let w = d.wire("w", &[(1, 0), (1, 0)], &[]);
    let mut access = AstNode::named(NodeKind::Identifier, "w")
        .with_span(SourceSpan::at_line(3).with_file("b.sv"));
    access.children = (0..3)
        .map(|_| {
            let c = d.ast.constant(0);
            d.ast.bit_select(c)
        })
        .collect();
    let access = d.ast.alloc(access);
    let b = d.unit(NodeKind::Module, "b", vec![w, access]);

    // module c: clean
    let v = d.wire("v", &[(3, 0), (3, 0)], &[]);
    let c = d.unit(NodeKind::Module, "c", vec![v]);
    let root = d.design(vec![a, b, c]);
    let before = d.ast[bad].clone();

    let report = d.flatten(root);
    assert_eq!(report.units, 3);
    assert_eq!(report.stats.flattened, 4);
    assert_eq!(report.errors.len(), 2);

    assert!(matches!(report.errors[0], FlattenError::UnresolvedConstant { .. }));
    assert!(report.errors[0].to_string().starts_with("a.sv:7:"));
    assert_eq!(d.ast[bad], before);

    match &report.errors[1] {
        FlattenError::InvalidDimensionCount {
            location,
            supplied,
            declared,
            ..
        } => {
            assert_eq!(location.to_string(), "b.sv:3");
            assert_eq!((*supplied, *declared), (3, 2));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(d.ast[v].layout().is_some());
}

#[test]
fn test_dot_fallback_composite_name() {
    let mut d = Design::new();
    let field = d.ast.alloc(AstNode::named(NodeKind::Dot, "rdata"));
    let access = d.ast.identifier("u_mem", vec![field]);
    let lhs = d.ast.identifier("q", vec![]);
    let stmt = d.assign(lhs, access);
    let top = d.unit(NodeKind::Module, "top", vec![stmt]);
    let root = d.design(vec![top]);

    let report = d.flatten(root);
    assert!(report.is_clean());
    assert_eq!(report.stats.renamed, 1);
    assert_eq!(d.ast[access].name, "u_mem.rdata");
}

#[test]
fn test_layout_metadata_persists() {
    let mut d = Design::new();
    let x = d.item("x", 3);
    let y = d.item("y", 5);
    let body = d.ast.alloc(AstNode::new(NodeKind::Union).with_children(vec![x, y]));
    let mut w = AstNode::named(NodeKind::Wire, "w").with_children(vec![body]);
    w.unpacked = d.ranges(&[(0, 3)]);
    let w = d.ast.alloc(w);
    let top = d.unit(NodeKind::Module, "top", vec![w]);
    d.flatten(top);

    let layout = d.layout(w).clone();
    assert_eq!(layout.total_size(), 20);
    let json = serde_json::to_string(&layout).unwrap();
    let restored: DimensionLayout = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, layout);
    assert_eq!(restored.record.unwrap().field("y").map(|f| (f.high, f.low)), Some((4, 0)));
}

#[test]
fn test_symbolic_field_selector() {
    let mut d = Design::new();
    // typedef struct packed { logic [3:0] hdr; logic [7:0] data; } pkt_t;
    let hdr = d.item("hdr", 4);
    let data = d.item("data", 8);
    let body = d.ast.alloc(AstNode::new(NodeKind::Struct).with_children(vec![hdr, data]));
    let typedef = d.unit(NodeKind::Typedef, "pkt_t", vec![body]);

    // pkt_t s; logic i; o = s.hdr[i];
    let ty = d.ast.alloc(AstNode::named(NodeKind::WireType, "pkt_t"));
    let s = d.ast.alloc(AstNode::named(NodeKind::Wire, "s").with_children(vec![ty]));
    let i_decl = d.wire("i", &[], &[]);
    let i = d.ast.identifier("i", vec![]);
    let sel = d.ast.bit_select(i);
    let field = d.ast.alloc(AstNode::named(NodeKind::Dot, "hdr").with_children(vec![sel]));
    let access = d.ast.identifier("s", vec![field]);
    let lhs = d.ast.identifier("o", vec![]);
    let stmt = d.assign(lhs, access);
    let top = d.unit(NodeKind::Module, "top", vec![typedef, s, i_decl, stmt]);
    let root = d.design(vec![top]);

    let report = d.flatten(root);
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.stats.expanded, 1);
    assert!(d.ast[access].is_prepared());
    assert_eq!(d.ast.display(access).to_string(), "s[((i + 1) + 7):(i + 8)]");
}

#[test]
fn test_typedef_chain_size() {
    let mut d = Design::new();
    // typedef logic [7:0] byte_t; typedef byte_t [3:0] word_t; word_t [1:0] x;
    let byte = d.wire("", &[(7, 0)], &[]);
    let byte_t = d.unit(NodeKind::Typedef, "byte_t", vec![byte]);
    let byte_ref = d.ast.alloc(AstNode::named(NodeKind::WireType, "byte_t"));
    let word = d.wire("", &[(3, 0)], &[]);
    d.ast.push_child(word, byte_ref);
    let word_t = d.unit(NodeKind::Typedef, "word_t", vec![word]);
    let ty = d.ast.alloc(AstNode::named(NodeKind::WireType, "word_t"));
    let x = d.wire("x", &[(1, 0)], &[]);
    d.ast.push_child(x, ty);
    let access = d.indexed("x", &[1, 2]);
    let rhs = d.ast.constant(0);
    let stmt = d.assign(access, rhs);
    let top = d.unit(NodeKind::Module, "top", vec![byte_t, word_t, x, stmt]);
    let root = d.design(vec![top]);

    let report = d.flatten(root);
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(d.layout(x).total_size(), 64);
    // x[1][2] is byte 2 of the upper word
    assert_eq!(d.bounds(access), Some((55, 48)));
}

#[test]
fn test_oversized_declaration_does_not_abort() {
    let mut d = Design::new();
    let wide = (1i64 << 40) - 1;
    let huge = d.wire("huge", &[(wide, 0), (wide, 0)], &[]);
    let ok = d.wire("ok", &[(1, 0), (1, 0)], &[]);
    let top = d.unit(NodeKind::Module, "top", vec![huge, ok]);
    let root = d.design(vec![top]);

    let report = d.flatten(root);
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0], FlattenError::SizeOverflow { .. }));
    assert_eq!(report.stats.flattened, 1);
    assert_eq!(d.ast[huge].packed.len(), 2);
}
