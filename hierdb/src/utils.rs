//! private utilities for the verilog loader.

use crate::*;
use sverilogparse::*;
use std::collections::HashSet;
use indexmap::IndexMap;
use either::Either;

/// Parsed modules by name, in source order.
pub(crate) type Modules = IndexMap<CompactString, (SVerilogModule, ModuleMap)>;

/// Find the top module.
/// If it is not explicitly specified, we guess it by scanning for
/// unreferenced ones.
pub(crate) fn find_top_module<'i>(
    modules: &'i Modules,
    top: Option<&'_ str>
) -> Result<&'i CompactString> {
    if modules.is_empty() {
        clilog::error!(HD_SV_EMPTY, "empty verilog netlist");
        return Err(HierError::Parse("no module in verilog source".into()))
    }
    if let Some(top) = top {
        return match modules.get_key_value(top) {
            Some((k, _)) => Ok(k),
            None => {
                clilog::error!(HD_SV_TOP_NF,
                               "top module {} not found in the verilog code", top);
                Err(HierError::not_found("module", top))
            }
        }
    }
    if let (1, Some(only)) = (modules.len(), modules.keys().next()) {
        return Ok(only)
    }
    let referenced = modules.values()
        .flat_map(|(m, _)| m.cells.iter())
        .filter(|cell| modules.contains_key(&cell.macro_name))
        .map(|cell| &cell.macro_name)
        .collect::<HashSet<_>>();
    let unrefs = modules.keys()
        .filter(|s| !referenced.contains(s))
        .collect::<Vec<_>>();
    match unrefs.len() {
        1 => {
            clilog::info!(HD_SV_GUESS_TOP, "the top module is guessed to be {}", unrefs[0]);
            Ok(unrefs[0])
        }
        0 => {
            clilog::error!(HD_SV_GUESS_TOP,
                           "there are cyclic references in netlist, cannot guess top module");
            Err(HierError::TypeMismatch("cyclic module references".into()))
        }
        n => {
            clilog::error!(HD_SV_GUESS_TOP,
                           "there are {} potential top modules: {:?}, please specify one",
                           n, unrefs);
            Err(HierError::Parse(format!("ambiguous top module among {:?}", unrefs)))
        }
    }
}

/// Enumerate an optional range object.
pub(crate) fn enum_in_width(
    w: Option<SVerilogRange>
) -> impl Iterator<Item = Option<isize>> {
    match w {
        None => Either::Left(Some(None).into_iter()),
        Some(r) => Either::Right(r.map(Some))
    }
}

/// Preprocessed declarations of one SVerilog module.
#[readonly::make]
pub(crate) struct ModuleMap {
    /// For each vector def, we store its range here.
    ///
    /// Scalar defs do not present in this map. This can be used
    /// to check whether a def is a scalar or a vector.
    pub def_widths: HashMap<CompactString, SVerilogRange>,
    /// For each def, we store its type (input/output/wire/...) here.
    pub def_types: HashMap<CompactString, WireDefType>,
    /// Ranges of vector ports, including named port connections
    /// `.p(expr)` in the module header. Scalar ports are absent.
    pub port_widths: HashMap<CompactString, SVerilogRange>,
}

/// A bit of a Wirexpr, created from [`ModuleMap::eval_expr`].
pub(crate) enum ExprBit<'i> {
    Const(u8 /* 0, 1, x, z => 0, 1, 2, 3 */),
    Var(&'i CompactString, Option<isize>)
}

impl ModuleMap {
    pub(crate) fn from(name: &str, m: &SVerilogModule) -> Result<ModuleMap> {
        let def_widths: HashMap<CompactString, SVerilogRange> = m.defs.iter()
            .filter_map(|SVerilogWireDef { name, width, .. }| {
                Some((name.clone(), (*width)?))
            })
            .collect();

        // an input/output port may later be defined as wire
        // again, which is then ignored.
        let mut def_types = HashMap::with_capacity(m.defs.len());
        for SVerilogWireDef { name: def, typ, .. } in &m.defs {
            use WireDefType::*;
            match def_types.get_mut(def) {
                Some(v) => match (*v, *typ) {
                    (Wire, Input | Output | InOut) => { *v = *typ; }
                    (_, Wire) => {}
                    (a, b) if a == b => {}
                    (a, b) => {
                        clilog::error!(HD_SV_DEF, "conflicting defs of {} in {}: {:?} and {:?}",
                                       def, name, a, b);
                        return Err(HierError::Parse(format!(
                            "conflicting definitions of {} in module {}", def, name)))
                    }
                },
                None => { def_types.insert(def.clone(), *typ); }
            }
        }
        let mut mm = ModuleMap { def_widths, def_types, port_widths: HashMap::new() };
        for port in &m.ports {
            let (pname, width) = match port {
                SVerilogPortDef::Basic(p) => (p, mm.def_widths.get(p).copied()),
                SVerilogPortDef::Conn(p, expr) => (p, mm.conn_port_width(expr)),
            };
            if let Some(w) = width {
                mm.port_widths.insert(pname.clone(), w);
            }
        }
        Ok(mm)
    }

    /// Range of a port declared as `.p(expr)`: `[len-1:0]` for a
    /// multi-bit expression, `[0:0]` for a single bit that comes
    /// from a vector, and scalar otherwise.
    fn conn_port_width(&self, expr: &Wirexpr) -> Option<SVerilogRange> {
        let len = self.eval_expr_len(expr);
        if len > 1 {
            return Some(SVerilogRange(len as isize - 1, 0))
        }
        let from_vector = |eb: &WirexprBasic| match eb {
            WirexprBasic::Full(s) => self.def_widths.contains_key(s),
            WirexprBasic::Slice(..) => true,
            WirexprBasic::SingleBit(..) | WirexprBasic::Literal(..) => false,
        };
        let vector = match expr {
            Wirexpr::Basic(eb) => from_vector(eb),
            Wirexpr::Concat(v) => v.iter().any(from_vector),
        };
        vector.then_some(SVerilogRange(0, 0))
    }

    /// Enumerate the bits of an expression, from the left-most one.
    pub(crate) fn eval_expr<'a>(
        &'a self, expr: &'a Wirexpr
    ) -> impl Iterator<Item = ExprBit<'a>> + 'a {
        use Either::*;
        #[inline]
        fn eval_basic<'a>(
            mm: &'a ModuleMap, exprbasic: &'a WirexprBasic,
        ) -> impl Iterator<Item = ExprBit<'a>> + 'a {
            use WirexprBasic::*;
            use ExprBit::*;
            let index_map = |s: &'a CompactString| move |i| Var(s, Some(i));
            match exprbasic {
                Full(s) => match mm.def_widths.get(s.as_str()) {
                    Some(range) => Right(Left(range.map(index_map(s)))),
                    None => Left(Some(Var(s, None)).into_iter())
                },
                SingleBit(s, i) => Left(Some(Var(s, Some(*i))).into_iter()),
                Slice(s, range) => Right(Left(range.map(index_map(s)))),
                Literal(size, value, is_xz) => Right(Right({
                    let (value, is_xz) = (*value, *is_xz);
                    let bit = |v: u128, i: usize| v.checked_shr(i as u32).unwrap_or(0) & 1;
                    (0..*size).rev()
                        .map(move |i| Const(((bit(is_xz, i) << 1) | bit(value, i)) as u8))
                }))
            }
        }
        use Wirexpr::*;
        match expr {
            Basic(basic) => Left(eval_basic(self, basic)),
            Concat(v) => Right(v.iter().flat_map(|b| eval_basic(self, b)))
        }
    }

    /// Length of an expr, without enumerating the bits.
    pub(crate) fn eval_expr_len(&self, expr: &Wirexpr) -> usize {
        let len_basic = |exprbasic: &WirexprBasic| -> usize {
            use WirexprBasic::*;
            match exprbasic {
                Full(s) => self.def_widths.get(s.as_str())
                    .map(|r| r.get_len()).unwrap_or(1),
                SingleBit(_, _) => 1,
                Slice(_, range) => range.get_len(),
                Literal(size, _, _) => *size
            }
        };
        match expr {
            Wirexpr::Basic(basic) => len_basic(basic),
            Wirexpr::Concat(v) => v.iter().map(len_basic).sum()
        }
    }
}

/// Order all modules so that every module comes after the modules
/// it instantiates, and check that no recursion occurs in the
/// hierarchy.
pub(crate) fn module_order(modules: &Modules) -> Result<Vec<&CompactString>> {
    let mut order = Vec::with_capacity(modules.len());
    let mut done = HashSet::new();
    for name in modules.keys() {
        visit_module(modules, &mut HashSet::new(), name, &mut done, &mut order)?;
    }
    Ok(order)
}

fn visit_module<'i>(
    modules: &'i Modules,
    parent_modules: &mut HashSet<&'i CompactString>,
    cur_name: &'i CompactString,
    done: &mut HashSet<&'i CompactString>,
    order: &mut Vec<&'i CompactString>
) -> Result<()> {
    if done.contains(cur_name) {
        return Ok(())
    }
    // without this check, the walk would never end on bad input.
    if !parent_modules.insert(cur_name) {
        clilog::error!(HD_SV_RECUR,
                       "module {} has recursion which is NOT allowed", cur_name);
        return Err(HierError::TypeMismatch(format!(
            "module {} instantiates itself", cur_name)))
    }
    let mut parent_modules = scopeguard::guard(parent_modules, |parent_modules| {
        parent_modules.remove(cur_name);
    });
    let (m, _) = &modules[cur_name];
    for cell in &m.cells {
        if let Some((sub, _)) = modules.get_key_value(&cell.macro_name) {
            visit_module(modules, &mut parent_modules, sub, done, order)?;
        }
    }
    done.insert(cur_name);
    order.push(cur_name);
    Ok(())
}

#[cfg(test)]
fn parse_modules(src: &str) -> Modules {
    SVerilog::parse_str(src).unwrap().modules.into_iter()
        .map(|(name, m)| {
            let mm = ModuleMap::from(&name, &m).unwrap();
            (name, (m, mm))
        })
        .collect()
}

#[test]
fn test_module_order() {
    let modules = parse_modules(r#"
module top(a);
  input a;
  mid m1(.a(a));
  leaf l1(.a(a));
endmodule
module mid(a);
  input a;
  leaf l1(.a(a));
endmodule
module leaf(a);
  input a;
endmodule
"#);
    let order = module_order(&modules).unwrap();
    assert_eq!(order.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
               vec!["leaf", "mid", "top"]);
    assert_eq!(find_top_module(&modules, None).unwrap().as_str(), "top");
    assert_eq!(find_top_module(&modules, Some("mid")).unwrap().as_str(), "mid");
    assert!(find_top_module(&modules, Some("nope")).is_err());

    let recursive = parse_modules(r#"
module a(x);
  input x;
  b u(.x(x));
endmodule
module b(x);
  input x;
  a u(.x(x));
endmodule
"#);
    assert!(matches!(module_order(&recursive), Err(HierError::TypeMismatch(_))));
}

#[test]
fn test_eval_expr() {
    let modules = parse_modules(r#"
module top(a, y);
  input [3:0] a;
  output y;
  AND2 u(.A({a[1:0], 2'b1x}), .Y(y));
endmodule
"#);
    let (m, mm) = &modules["top"];
    let expr = &m.cells[0].ioports[0].1;
    assert_eq!(mm.eval_expr_len(expr), 4);
    let bits = mm.eval_expr(expr).map(|b| match b {
        ExprBit::Const(c) => format!("{}", c),
        ExprBit::Var(s, i) => format!("{}{:?}", s, i),
    }).collect::<Vec<_>>();
    assert_eq!(bits, vec!["aSome(1)", "aSome(0)", "1", "2"]);
    assert_eq!(enum_in_width(mm.def_widths.get("a").copied()).collect::<Vec<_>>(),
               vec![Some(3), Some(2), Some(1), Some(0)]);
    assert_eq!(enum_in_width(None).collect::<Vec<_>>(), vec![None]);
}

#[test]
fn test_named_port_widths() {
    let modules = parse_modules(r#"
module top(.d({p, q}), .e(v[2]), .f(v[1:1]), .g(v), .h(p), y);
  input p, q;
  input [2:0] v;
  output y;
endmodule
"#);
    let (_, mm) = &modules["top"];
    let w = |p: &str| mm.port_widths.get(p).map(|r| (r.0, r.1));
    assert_eq!(w("d"), Some((1, 0)));
    assert_eq!(w("e"), None);
    assert_eq!(w("f"), Some((0, 0)));
    assert_eq!(w("g"), Some((2, 0)));
    assert_eq!(w("h"), None);
    assert_eq!(w("y"), None);
    assert!(mm.def_widths.get("d").is_none());
}
