use std::rc::Rc;

use tramp_core::{CallStack, Env, EvalContext, Pair, SourceLocation, Symbol, TrampError, Value};

use crate::eval::{apply_procedure, ensure_specified, evaluate};

type Located = (Value, Option<Rc<SourceLocation>>);

fn located(cell: &Pair) -> Located {
    (cell.head().clone(), cell.location().cloned())
}

/// Rebuild a form as `(keyword items...)`, tagging the keyword cell with
/// the original form's location.
fn form(keyword: &Symbol, location: &Rc<SourceLocation>, items: Vec<Located>) -> Value {
    let mut cells = Vec::with_capacity(items.len() + 1);
    cells.push((Value::Symbol(keyword.clone()), Some(location.clone())));
    cells.extend(items);
    Value::list_with_locations(cells, Value::Nil)
}

fn bad(what: &str, location: &Rc<SourceLocation>) -> TrampError {
    TrampError::syntax(format!("Bad {what} form."), location.clone())
}

/// Validate special-form shapes and rewrite macro uses and quasiquotes into
/// core forms.
///
/// `is_top_level` permits `define-macro`; `begin` and macro results keep the
/// flag they were reached with, everything else is expanded as non-top-level.
pub fn expand(
    ctx: &EvalContext,
    expr: &Value,
    env: &Env,
    is_top_level: bool,
) -> Result<Value, TrampError> {
    let pair = match expr {
        Value::Pair(pair) => pair,
        Value::Nil => return Err(TrampError::eval("unexpected empty list")),
        other => return Ok(other.clone()),
    };
    let location = pair.location_or_unknown();
    if !pair.is_list() {
        return Err(TrampError::syntax(
            "Attempted to expand a pair which was not a list.",
            location,
        ));
    }
    expand_form(ctx, pair, &location, env, is_top_level).map_err(|e| {
        if e.is_ordinary() {
            e.into_syntax("Error during expansion: ", location.clone())
        } else {
            e
        }
    })
}

fn expand_form(
    ctx: &EvalContext,
    pair: &Pair,
    location: &Rc<SourceLocation>,
    env: &Env,
    is_top_level: bool,
) -> Result<Value, TrampError> {
    let kw = ctx.interner.keywords();
    let args: Vec<&Pair> = pair.cells().skip(1).collect();

    let Some(head) = pair.head().as_symbol() else {
        return expand_application(ctx, pair, env);
    };

    if *head == kw.quote {
        if args.len() != 1 {
            return Err(bad("quote", location));
        }
        Ok(Value::Pair(Rc::new(Pair::new(
            pair.head().clone(),
            pair.tail().clone(),
            Some(location.clone()),
        ))))
    } else if *head == kw.quasiquote {
        if args.len() != 1 {
            return Err(bad("quasiquote", location));
        }
        let desugared = expand_quasiquote(ctx, args[0].head(), location)?;
        expand(ctx, &desugared, env, false)
    } else if *head == kw.unquote {
        Err(TrampError::syntax(
            "unquote not valid outside of quasiquote",
            location.clone(),
        ))
    } else if *head == kw.unquote_splicing {
        Err(TrampError::syntax(
            "unquote-splicing not valid outside of quasiquote",
            location.clone(),
        ))
    } else if *head == kw.if_ {
        if !(2..=3).contains(&args.len()) {
            return Err(bad("if", location));
        }
        let mut items = args
            .iter()
            .map(|cell| {
                let expanded = ensure_specified(expand(ctx, cell.head(), env, false)?)?;
                Ok((expanded, cell.location().cloned()))
            })
            .collect::<Result<Vec<_>, TrampError>>()?;
        if items.len() == 2 {
            items.push((Value::Unspecified, None));
        }
        Ok(form(&kw.if_, location, items))
    } else if *head == kw.set {
        let [name, value] = args.as_slice() else {
            return Err(bad("set!", location));
        };
        if name.head().as_symbol().is_none() {
            return Err(TrampError::wrong_type(name.head(), "symbol"));
        }
        let expanded = ensure_specified(expand(ctx, value.head(), env, false)?)?;
        Ok(form(
            &kw.set,
            location,
            vec![located(name), (expanded, value.location().cloned())],
        ))
    } else if *head == kw.define || *head == kw.define_macro {
        expand_define(ctx, head, &args, location, env, is_top_level)
    } else if *head == kw.begin {
        let body = args
            .iter()
            .map(|cell| {
                let expanded = expand(ctx, cell.head(), env, is_top_level)?;
                Ok((expanded, cell.location().cloned()))
            })
            .filter(|item: &Result<Located, TrampError>| {
                !matches!(item, Ok((Value::Unspecified, _)))
            })
            .collect::<Result<Vec<_>, TrampError>>()?;
        if body.is_empty() {
            return Ok(Value::Unspecified);
        }
        Ok(form(&kw.begin, location, body))
    } else if *head == kw.lambda {
        expand_lambda(ctx, &args, location, env)
    } else if let Some(transformer) = ctx.lookup_macro(head) {
        let raw_args: Vec<Value> = args.iter().map(|cell| cell.head().clone()).collect();
        let result = apply_procedure(ctx, &transformer, &raw_args, &CallStack::new())?;
        tracing::trace!(macro_name = %head, expansion = %result, "expanded macro");
        expand(ctx, &result, env, is_top_level)
    } else {
        expand_application(ctx, pair, env)
    }
}

fn expand_application(ctx: &EvalContext, pair: &Pair, env: &Env) -> Result<Value, TrampError> {
    let mut items = Vec::with_capacity(pair.len());
    for cell in pair.cells() {
        let expanded = expand(ctx, cell.head(), env, false)?;
        if !expanded.is_unspecified() {
            items.push((expanded, cell.location().cloned()));
        }
    }
    if items.is_empty() {
        return Ok(Value::Unspecified);
    }
    Ok(Value::list_with_locations(items, Value::Nil))
}

fn expand_define(
    ctx: &EvalContext,
    keyword: &Symbol,
    args: &[&Pair],
    location: &Rc<SourceLocation>,
    env: &Env,
    is_top_level: bool,
) -> Result<Value, TrampError> {
    let kw = ctx.interner.keywords();
    let what = keyword.name();
    let Some((target, rest)) = args.split_first() else {
        return Err(bad(what, location));
    };

    // (define (name param...) body...) => (define name (lambda (param...) body...))
    if let Value::Pair(signature) = target.head() {
        if rest.is_empty() {
            return Err(bad(what, location));
        }
        let name = signature.head();
        if name.as_symbol().is_none() {
            return Err(TrampError::wrong_type(name, "symbol"));
        }
        let mut lambda_items = Vec::with_capacity(rest.len() + 1);
        lambda_items.push((signature.tail().clone(), target.location().cloned()));
        lambda_items.extend(rest.iter().map(|cell| located(cell)));
        let lambda = form(&kw.lambda, location, lambda_items);
        let rewritten = form(
            keyword,
            location,
            vec![
                (name.clone(), signature.location().cloned()),
                (lambda, Some(location.clone())),
            ],
        );
        return expand(ctx, &rewritten, env, is_top_level);
    }

    let [value] = rest else {
        return Err(bad(what, location));
    };
    let name = target
        .head()
        .as_symbol()
        .ok_or_else(|| TrampError::wrong_type(target.head(), "symbol"))?;
    let expanded = ensure_specified(expand(ctx, value.head(), env, false)?)?;

    if *keyword == kw.define_macro {
        if !is_top_level {
            return Err(TrampError::syntax(
                "Must define macros at the top level.",
                location.clone(),
            ));
        }
        let transformer = evaluate(
            ctx,
            &expanded,
            env,
            "<macro>".into(),
            location.clone(),
            &CallStack::new(),
        )?;
        let Value::Procedure(transformer) = transformer else {
            return Err(TrampError::syntax(
                "Macro body must be a procedure.",
                location.clone(),
            ));
        };
        tracing::debug!(macro_name = %name, "registered macro");
        ctx.define_macro(name.clone(), transformer);
        return Ok(Value::Unspecified);
    }

    Ok(form(
        &kw.define,
        location,
        vec![located(target), (expanded, value.location().cloned())],
    ))
}

fn expand_lambda(
    ctx: &EvalContext,
    args: &[&Pair],
    location: &Rc<SourceLocation>,
    env: &Env,
) -> Result<Value, TrampError> {
    let kw = ctx.interner.keywords();
    let Some((params, body)) = args.split_first() else {
        return Err(bad("lambda", location));
    };
    if body.is_empty() {
        return Err(bad("lambda", location));
    }
    let valid_params = match params.head() {
        Value::Nil | Value::Symbol(_) => true,
        Value::Pair(p) => p.is_list() && p.iter().all(|v| v.as_symbol().is_some()),
        _ => false,
    };
    if !valid_params {
        return Err(bad("lambda", location));
    }

    let single_body = match body {
        [only] => only.head().clone(),
        many => form(
            &kw.begin,
            location,
            many.iter().map(|cell| located(cell)).collect(),
        ),
    };
    let expanded = ensure_specified(expand(ctx, &single_body, env, false)?)?;
    Ok(form(
        &kw.lambda,
        location,
        vec![
            located(params),
            (expanded, body[0].location().cloned()),
        ],
    ))
}

fn is_keyword_form(value: &Value, keyword: &Symbol) -> bool {
    matches!(value, Value::Pair(p) if p.head().as_symbol() == Some(keyword))
}

/// The operand of `(unquote x)` or `(unquote-splicing x)`.
fn unquote_operand(
    form_pair: &Pair,
    what: &str,
    location: &Rc<SourceLocation>,
) -> Result<Value, TrampError> {
    if !form_pair.is_list() || form_pair.len() != 2 {
        return Err(bad(what, location));
    }
    match form_pair.tail() {
        Value::Pair(rest) => Ok(rest.head().clone()),
        _ => Err(bad(what, location)),
    }
}

/// Desugar the body of a quasiquote into `cons`, `append` and `quote` calls.
fn expand_quasiquote(
    ctx: &EvalContext,
    template: &Value,
    location: &Rc<SourceLocation>,
) -> Result<Value, TrampError> {
    let kw = ctx.interner.keywords();
    let call = |keyword: &Symbol, items: Vec<Value>| {
        form(
            keyword,
            location,
            items.into_iter().map(|v| (v, Some(location.clone()))).collect(),
        )
    };

    let Value::Pair(pair) = template else {
        return Ok(call(&kw.quote, vec![template.clone()]));
    };
    let pair_loc = pair.location().cloned().unwrap_or_else(|| location.clone());

    if is_keyword_form(template, &kw.unquote) {
        return unquote_operand(pair, "unquote", &pair_loc);
    }
    if is_keyword_form(template, &kw.unquote_splicing) {
        return Err(TrampError::syntax(
            "unquote-splicing not valid in this position",
            pair_loc,
        ));
    }

    let head = pair.head();
    let rest = pair.tail();
    if let Value::Pair(inner) = head {
        if is_keyword_form(head, &kw.unquote_splicing) {
            let inner_loc = inner.location().cloned().unwrap_or_else(|| pair_loc.clone());
            let spliced = unquote_operand(inner, "unquote-splicing", &inner_loc)?;
            if rest.is_nil() {
                return Ok(spliced);
            }
            let tail = expand_quasiquote(ctx, rest, location)?;
            return Ok(call(&kw.append, vec![spliced, tail]));
        }
    }
    let head = expand_quasiquote(ctx, head, location)?;
    let tail = expand_quasiquote(ctx, rest, location)?;
    Ok(call(&kw.cons, vec![head, tail]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tramp_reader::read_one;

    fn expand_src(ctx: &EvalContext, src: &str) -> Result<Value, TrampError> {
        let form = read_one(src, &ctx.interner)?;
        expand(ctx, &form, &ctx.global_env, true)
    }

    fn expanded(src: &str) -> String {
        let ctx = EvalContext::new();
        crate::install(&ctx);
        expand_src(&ctx, src).unwrap().to_string()
    }

    fn syntax_error(src: &str) -> String {
        let ctx = EvalContext::new();
        crate::install(&ctx);
        match expand_src(&ctx, src) {
            Err(e @ TrampError::Syntax { .. }) => e.to_string(),
            other => panic!("expected syntax error for `{src}`, got {other:?}"),
        }
    }

    #[test]
    fn test_quote_verbatim() {
        assert_eq!(expanded("'(if x)"), "(quote (if x))");
        assert!(syntax_error("(quote)").contains("Bad quote form."));
        assert!(syntax_error("(quote a b)").contains("Bad quote form."));
    }

    #[test]
    fn test_if_padding() {
        assert_eq!(expanded("(if a b)"), "(if a b #<unspecified>)");
        assert_eq!(expanded("(if a b c)"), "(if a b c)");
        assert!(syntax_error("(if a)").contains("Bad if form."));
        assert!(syntax_error("(if a b c d)").contains("Bad if form."));
    }

    #[test]
    fn test_define_function_sugar() {
        assert_eq!(
            expanded("(define (f x) (* x x))"),
            "(define f (lambda (x) (* x x)))"
        );
        assert_eq!(
            expanded("(define (f) 1 2)"),
            "(define f (lambda () (begin 1 2)))"
        );
        assert_eq!(expanded("(define (f . args) args)"), "(define f (lambda args args))");
        assert!(syntax_error("(define x)").contains("Bad define form."));
        assert!(syntax_error("(define x 1 2)").contains("Bad define form."));
        assert!(syntax_error("(define 1 2)").contains("Error during expansion: "));
    }

    #[test]
    fn test_set_requires_symbol() {
        assert_eq!(expanded("(set! x (f 1))"), "(set! x (f 1))");
        assert!(syntax_error("(set! 1 2)").contains("incorrect type"));
        assert!(syntax_error("(set! x)").contains("Bad set! form."));
    }

    #[test]
    fn test_lambda_shapes() {
        assert_eq!(expanded("(lambda (a b) a b)"), "(lambda (a b) (begin a b))");
        assert_eq!(expanded("(lambda args args)"), "(lambda args args)");
        assert!(syntax_error("(lambda (x))").contains("Bad lambda form."));
        assert!(syntax_error("(lambda (1) x)").contains("Bad lambda form."));
        assert!(syntax_error("(lambda (a . b) a)").contains("Bad lambda form."));
    }

    #[test]
    fn test_begin_drops_unspecified() {
        assert_eq!(expanded("(begin)"), "#<unspecified>");
        assert_eq!(
            expanded("(begin (define-macro m (lambda () 1)) 2)"),
            "(begin 2)"
        );
    }

    #[test]
    fn test_quasiquote_desugaring() {
        assert_eq!(expanded("`x"), "(quote x)");
        assert_eq!(expanded("`,x"), "x");
        assert_eq!(
            expanded("`(a ,b)"),
            "(cons (quote a) (cons b (quote ())))"
        );
        assert_eq!(
            expanded("`(a ,@b c)"),
            "(cons (quote a) (append b (cons (quote c) (quote ()))))"
        );
        assert_eq!(expanded("`(,@b)"), "b");
        assert_eq!(expanded("`(a . ,b)"), "(cons (quote a) b)");
    }

    #[test]
    fn test_unquote_outside_quasiquote() {
        assert!(syntax_error(",x").contains("unquote not valid outside of quasiquote"));
        assert!(syntax_error(",@x").contains("unquote-splicing not valid outside"));
        assert!(syntax_error("`,@x").contains("unquote-splicing not valid"));
        assert!(syntax_error("`(a (unquote b c))").contains("Bad unquote form."));
    }

    #[test]
    fn test_define_macro_only_at_top_level() {
        let msg = syntax_error("(f (define-macro m (lambda () 1)))");
        assert!(msg.contains("Must define macros at the top level."), "{msg}");
    }

    #[test]
    fn test_macro_must_be_procedure() {
        let msg = syntax_error("(define-macro m 5)");
        assert!(msg.contains("Macro body must be a procedure."), "{msg}");
    }

    #[test]
    fn test_macro_expansion() {
        let ctx = EvalContext::new();
        crate::install(&ctx);
        let defined = expand_src(&ctx, "(define-macro (unless-false x) x)").unwrap();
        assert!(defined.is_unspecified());
        assert!(ctx.lookup_macro(&ctx.intern("unless-false")).is_some());
        assert_eq!(
            expand_src(&ctx, "(unless-false (g 2))").unwrap().to_string(),
            "(g 2)"
        );
    }

    #[test]
    fn test_non_list_form() {
        assert!(syntax_error("(a . b)").contains("not a list"));
    }

    #[test]
    fn test_empty_list_inside_form() {
        let msg = syntax_error("(f ())");
        assert!(msg.contains("Error during expansion: unexpected empty list"), "{msg}");
    }

    #[test]
    fn test_keyword_cells_keep_location() {
        let ctx = EvalContext::new();
        crate::install(&ctx);
        let out = expand_src(&ctx, "  (if a b)").unwrap();
        let loc = out.as_pair().unwrap().location().unwrap().clone();
        assert_eq!((loc.line, loc.column), (1, 4));
    }
}
