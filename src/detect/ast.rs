use std::ops::Range;
use std::path::Path;

use swc_common::comments::SingleThreadedComments;
use swc_common::sync::Lrc;
use swc_common::{FileName, SourceMap, Span, Spanned};
use swc_ecma_ast::{
    CallExpr, Callee, ClassDecl, ClassExpr, ExportAll, Expr, FnDecl, FnExpr, ImportDecl, JSXAttr,
    JSXAttrName, JSXAttrValue, JSXElement, JSXElementName, JSXExpr, JSXText, KeyValueProp, Lit,
    MemberProp, Module, NamedExport, Pat, PropName, Str, TaggedTpl, Tpl, TsEnumMemberId,
    TsExternalModuleRef, TsModuleName, TsType, VarDeclarator,
};
use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax, TsSyntax};
use swc_ecma_visit::{Visit, VisitWith};

use super::{Classification, DetectOptions, Occurrence, StrategyKind, TextSite};
use crate::error::MigrateError;
use crate::ignore::{literal_suppression, overlaps};
use crate::source::SourceText;

/// Extensions the SWC parser is used for.
const PARSEABLE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

/// Tags whose content is code or markup, never UI text.
const IGNORED_TAGS: &[&str] = &["script", "style", "code", "pre"];

/// A parsed module with what is needed to map spans back to byte offsets.
pub struct ParsedModule {
    pub module: Module,
    pub comments: SingleThreadedComments,
    /// `BytePos` of the first byte of the file in the source map
    base: u32,
}

impl ParsedModule {
    fn byte_range(&self, span: Span) -> Range<usize> {
        to_range(self.base, span)
    }
}

fn to_range(base: u32, span: Span) -> Range<usize> {
    let lo = span.lo.0.saturating_sub(base) as usize;
    let hi = span.hi.0.saturating_sub(base) as usize;
    lo..hi.max(lo)
}

/// Parse a JS/TS source into a module.
///
/// Recoverable parser errors are treated as failures too, so that a
/// successful parse means the text is syntactically valid.
pub fn parse_source(source: &SourceText) -> Result<ParsedModule, MigrateError> {
    let path = Path::new(source.path());
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !PARSEABLE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(MigrateError::Parse {
            path: source.path().to_string(),
            line: 1,
            column: 1,
            message: format!("unsupported file type '.{}'", ext),
        });
    }

    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        FileName::Real(path.to_path_buf()).into(),
        source.text().to_string(),
    );
    let base = fm.start_pos.0;

    // `.ts` files may use `<T>expr` casts, which conflict with JSX
    let syntax = Syntax::Typescript(TsSyntax {
        tsx: source.allows_jsx(),
        decorators: true,
        ..Default::default()
    });

    let comments = SingleThreadedComments::default();
    let lexer = Lexer::new(
        syntax,
        Default::default(),
        StringInput::from(&*fm),
        Some(&comments),
    );
    let mut parser = Parser::new_from(lexer);

    let parse_error = |span: Span, message: String| {
        let (line, column) = source.position(to_range(base, span).start);
        MigrateError::Parse {
            path: source.path().to_string(),
            line,
            column,
            message,
        }
    };

    let module = parser
        .parse_module()
        .map_err(|e| parse_error(e.span(), format!("{:?}", e.kind())))?;
    if let Some(e) = parser.take_errors().into_iter().next() {
        return Err(parse_error(e.span(), format!("{:?}", e.kind())));
    }

    Ok(ParsedModule {
        module,
        comments,
        base,
    })
}

/// Precise detector visiting string literals, JSX text and JSX attributes.
#[derive(Debug, Clone)]
pub struct AstDetector {
    options: DetectOptions,
}

impl AstDetector {
    pub fn new(options: DetectOptions) -> Self {
        Self { options }
    }

    pub fn scan(&self, source: &SourceText) -> Result<Vec<Occurrence>, MigrateError> {
        let parsed = parse_source(source)?;
        let comment_spans = collect_comment_spans(&parsed);

        let mut visitor = HardcodedTextVisitor {
            source,
            options: &self.options,
            base: parsed.base,
            comment_spans,
            context: Vec::new(),
            occurrences: Vec::new(),
        };
        parsed.module.visit_with(&mut visitor);

        let mut found = visitor.occurrences;
        found.sort_by_key(|o| (o.byte_span.start, o.byte_span.end));
        found.dedup_by(|a, b| a.byte_span == b.byte_span);
        Ok(found)
    }
}

fn collect_comment_spans(parsed: &ParsedModule) -> Vec<Range<usize>> {
    let (leading, trailing) = parsed.comments.borrow_all();
    leading
        .values()
        .chain(trailing.values())
        .flatten()
        .map(|comment| parsed.byte_range(comment.span))
        .collect()
}

/// Walks the module tracking the nearest named declaration.
struct HardcodedTextVisitor<'a> {
    source: &'a SourceText,
    options: &'a DetectOptions,
    base: u32,
    comment_spans: Vec<Range<usize>>,
    /// Names of enclosing functions, classes and components, innermost last
    context: Vec<String>,
    occurrences: Vec<Occurrence>,
}

impl<'a> HardcodedTextVisitor<'a> {
    fn range(&self, span: Span) -> Range<usize> {
        to_range(self.base, span)
    }

    fn with_context(&mut self, name: String, f: impl FnOnce(&mut Self)) {
        self.context.push(name);
        f(self);
        self.context.pop();
    }

    fn push(
        &mut self,
        span: Range<usize>,
        value: &str,
        classification: Classification,
        site: TextSite,
    ) {
        if self.comment_spans.iter().any(|c| overlaps(c, &span)) {
            return;
        }
        if let Some(occ) = Occurrence::at(
            self.source,
            span,
            value.to_string(),
            classification,
            site,
            StrategyKind::Ast,
            self.context.last().cloned(),
        ) {
            self.occurrences.push(occ);
        }
    }

    /// Content range of a quoted string literal, excluding the quotes.
    fn string_inner(&self, span: Span) -> Option<Range<usize>> {
        let range = self.range(span);
        let raw = self.source.slice(&range)?;
        let bytes = raw.as_bytes();
        if bytes.len() < 3 {
            return None;
        }
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first != last || !matches!(first, b'"' | b'\'' | b'`') {
            return None;
        }
        Some(range.start + 1..range.end - 1)
    }

    /// Whitespace-trimmed sub-range of `range`.
    fn trimmed(&self, range: Range<usize>) -> Option<Range<usize>> {
        let raw = self.source.slice(&range)?;
        let leading = raw.len() - raw.trim_start().len();
        let trailing = raw.len() - raw.trim_end().len();
        if leading + trailing >= raw.len() {
            return None;
        }
        Some(range.start + leading..range.end - trailing)
    }

    fn report_attribute_str(&mut self, s: &Str, attr_name: &str, site: TextSite) {
        let Some(value) = s.value.as_str() else {
            return;
        };
        let classification = if self.options.cjk_candidate(value) {
            Classification::Cjk
        } else if self.options.localizable_attributes.contains(attr_name)
            && self.options.english_candidate(value)
        {
            Classification::JsxAttribute
        } else {
            return;
        };
        if literal_suppression(value).is_some() {
            return;
        }
        if let Some(inner) = self.string_inner(s.span) {
            self.push(inner, value, classification, site);
        }
    }
}

fn attr_name(name: &JSXAttrName) -> String {
    match name {
        JSXAttrName::Ident(ident) => ident.sym.to_string(),
        JSXAttrName::JSXNamespacedName(ns) => format!("{}:{}", ns.ns.sym, ns.name.sym),
    }
}

fn prop_name_text(name: &PropName) -> Option<String> {
    match name {
        PropName::Ident(ident) => Some(ident.sym.to_string()),
        PropName::Str(s) => s.value.as_str().map(|v| v.to_string()),
        _ => None,
    }
}

/// Initializers that make a variable a named function or component,
/// including wrappers such as `memo(() => ...)`.
fn is_function_like(expr: &Expr) -> bool {
    match expr {
        Expr::Arrow(_) | Expr::Fn(_) | Expr::Class(_) => true,
        Expr::Paren(paren) => is_function_like(&paren.expr),
        Expr::Call(call) => call.args.iter().any(|arg| is_function_like(&arg.expr)),
        _ => false,
    }
}

/// `require(...)`, dynamic `import(...)` and `console.*(...)` calls.
fn is_non_ui_call(call: &CallExpr) -> bool {
    match &call.callee {
        Callee::Import(_) => true,
        Callee::Expr(expr) => match expr.as_ref() {
            Expr::Ident(ident) => ident.sym.as_ref() == "require",
            Expr::Member(member) => {
                matches!(member.obj.as_ref(), Expr::Ident(obj) if obj.sym.as_ref() == "console")
                    && matches!(member.prop, MemberProp::Ident(_))
            }
            _ => false,
        },
        _ => false,
    }
}

impl<'a> Visit for HardcodedTextVisitor<'a> {
    // Module specifiers and types are never UI text

    fn visit_import_decl(&mut self, _: &ImportDecl) {}

    fn visit_export_all(&mut self, _: &ExportAll) {}

    fn visit_named_export(&mut self, _: &NamedExport) {}

    fn visit_ts_external_module_ref(&mut self, _: &TsExternalModuleRef) {}

    fn visit_ts_type(&mut self, _: &TsType) {}

    fn visit_ts_module_name(&mut self, _: &TsModuleName) {}

    fn visit_ts_enum_member_id(&mut self, _: &TsEnumMemberId) {}

    fn visit_tagged_tpl(&mut self, _: &TaggedTpl) {}

    fn visit_prop_name(&mut self, name: &PropName) {
        if let PropName::Computed(computed) = name {
            computed.visit_with(self);
        }
    }

    fn visit_key_value_prop(&mut self, prop: &KeyValueProp) {
        let is_label_property = prop_name_text(&prop.key)
            .map(|key| self.options.label_properties.contains(&key))
            .unwrap_or(false);
        if is_label_property {
            return;
        }
        prop.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, call: &CallExpr) {
        if is_non_ui_call(call) {
            return;
        }
        call.visit_children_with(self);
    }

    // Declarations that name a scope

    fn visit_fn_decl(&mut self, decl: &FnDecl) {
        let name = decl.ident.sym.to_string();
        self.with_context(name, |this| decl.function.visit_with(this));
    }

    fn visit_class_decl(&mut self, decl: &ClassDecl) {
        let name = decl.ident.sym.to_string();
        self.with_context(name, |this| decl.class.visit_with(this));
    }

    fn visit_fn_expr(&mut self, expr: &FnExpr) {
        match &expr.ident {
            Some(ident) => {
                let name = ident.sym.to_string();
                self.with_context(name, |this| expr.function.visit_with(this));
            }
            None => expr.visit_children_with(self),
        }
    }

    fn visit_class_expr(&mut self, expr: &ClassExpr) {
        match &expr.ident {
            Some(ident) => {
                let name = ident.sym.to_string();
                self.with_context(name, |this| expr.class.visit_with(this));
            }
            None => expr.visit_children_with(self),
        }
    }

    fn visit_var_declarator(&mut self, decl: &VarDeclarator) {
        let name = match (&decl.name, decl.init.as_deref()) {
            (Pat::Ident(binding), Some(init)) if is_function_like(init) => {
                Some(binding.id.sym.to_string())
            }
            _ => None,
        };
        match name {
            Some(name) => self.with_context(name, |this| decl.visit_children_with(this)),
            None => decl.visit_children_with(self),
        }
    }

    // Text

    fn visit_jsx_element(&mut self, elem: &JSXElement) {
        if let JSXElementName::Ident(ident) = &elem.opening.name {
            let tag = ident.sym.to_string().to_lowercase();
            if IGNORED_TAGS.contains(&tag.as_str()) {
                return;
            }
        }
        elem.visit_children_with(self);
    }

    fn visit_jsx_text(&mut self, text: &JSXText) {
        let Some(span) = self.trimmed(self.range(text.span)) else {
            return;
        };
        let Some(value) = self.source.slice(&span).map(str::to_string) else {
            return;
        };
        let classification = if self.options.cjk_candidate(&value) {
            Classification::Cjk
        } else if self.options.english_candidate(&value) {
            Classification::JsxText
        } else {
            return;
        };
        if literal_suppression(&value).is_some() {
            return;
        }
        self.push(span, &value, classification, TextSite::JsxText);
    }

    fn visit_jsx_attr(&mut self, attr: &JSXAttr) {
        let name = attr_name(&attr.name);
        if name == "className" || name == "class" || self.options.label_properties.contains(&name)
        {
            return;
        }
        match &attr.value {
            Some(JSXAttrValue::Str(s)) => {
                self.report_attribute_str(s, &name, TextSite::JsxAttribute);
            }
            Some(JSXAttrValue::JSXExprContainer(container)) => {
                if let JSXExpr::Expr(expr) = &container.expr {
                    if let Expr::Lit(Lit::Str(s)) = expr.as_ref() {
                        self.report_attribute_str(s, &name, TextSite::Literal);
                        return;
                    }
                }
                attr.visit_children_with(self);
            }
            Some(_) => attr.visit_children_with(self),
            None => {}
        }
    }

    fn visit_str(&mut self, s: &Str) {
        let Some(value) = s.value.as_str() else {
            return;
        };
        if !self.options.cjk_candidate(value) {
            return;
        }
        if literal_suppression(value).is_some() {
            return;
        }
        if let Some(inner) = self.string_inner(s.span) {
            self.push(inner, value, Classification::Cjk, TextSite::Literal);
        }
    }

    fn visit_tpl(&mut self, tpl: &Tpl) {
        if tpl.exprs.is_empty() {
            let value = tpl
                .quasis
                .first()
                .and_then(|q| q.cooked.as_ref())
                .and_then(|c| c.as_str())
                .map(str::to_string);
            if let Some(value) = value {
                if self.options.cjk_candidate(&value)
                    && literal_suppression(&value).is_none()
                {
                    if let Some(inner) = self.string_inner(tpl.span) {
                        self.push(inner, &value, Classification::Cjk, TextSite::Literal);
                    }
                }
            }
            return;
        }

        // Interpolated templates are reported for review but never rewritten
        let tpl_start = self.range(tpl.span).start;
        for (i, quasi) in tpl.quasis.iter().enumerate() {
            let raw = quasi.raw.to_string();
            if !self.options.cjk_candidate(&raw) {
                continue;
            }
            // Quasi i starts after the backtick or after the `}` closing expr i-1
            let start = if i == 0 {
                Some(tpl_start + 1)
            } else {
                tpl.exprs.get(i - 1).and_then(|expr| {
                    let after = self.range(expr.span()).end;
                    let rest = self.source.text().get(after..)?;
                    rest.find('}').map(|pos| after + pos + 1)
                })
            };
            let Some(start) = start else {
                continue;
            };
            let range = start..start + raw.len();
            if self.source.slice(&range) != Some(raw.as_str()) {
                continue;
            }
            if let Some(span) = self.trimmed(range) {
                let value = self.source.slice(&span).unwrap_or_default().to_string();
                self.push(span, &value, Classification::Cjk, TextSite::Unknown);
            }
        }
        for expr in &tpl.exprs {
            expr.visit_with(self);
        }
    }
}

/// Convenience for callers that only need to know the text still parses.
pub fn check_syntax(source: &SourceText) -> Result<(), MigrateError> {
    parse_source(source).map(|_| ())
}
