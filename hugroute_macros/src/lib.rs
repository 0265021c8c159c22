//! `#[endpoint]`: derive a `hugroute::Endpoint` from a plain function.
//!
//! ```rust,ignore
//! use hugroute::endpoint;
//!
//! /// Says hello
//! #[endpoint]
//! fn hello(name: String, #[param(default = "hello")] greeting: String, times: Option<u32>) -> String {
//!     format!("{greeting} {name}").repeat(times.unwrap_or(1) as usize)
//! }
//!
//! let endpoint = hello_endpoint();
//! ```
//!
//! Each parameter becomes a signature parameter of the same name, annotated
//! from its Rust type (integers as whole numbers, floats, smart booleans,
//! text, lists of text) unless `#[param(annotation = expr)]` supplies one.
//! `Option<T>` parameters default to `null`; `#[param(default = expr)]` sets
//! any other default. A `&Call` or `&mut Call` parameter receives the call
//! itself. Doc comments become the endpoint documentation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{
    parse_macro_input, Attribute, Expr, ExprLit, FnArg, GenericArgument, ItemFn, Lit, LitStr, Meta,
    Pat, PathArguments, Token, Type,
};

struct EndpointArgs {
    name: Option<LitStr>,
}

impl Parse for EndpointArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut name = None;
        let metas = Punctuated::<Meta, Token![,]>::parse_terminated(input)?;
        for meta in metas {
            match meta {
                Meta::NameValue(nv) if nv.path.is_ident("name") => match nv.value {
                    Expr::Lit(ExprLit { lit: Lit::Str(lit), .. }) => name = Some(lit),
                    other => return Err(syn::Error::new_spanned(other, "expected a string literal")),
                },
                other => return Err(syn::Error::new_spanned(other, "unknown endpoint option")),
            }
        }
        Ok(Self { name })
    }
}

#[derive(Default)]
struct ParamOptions {
    default: Option<Expr>,
    annotation: Option<Expr>,
}

fn param_options(attrs: &mut Vec<Attribute>) -> syn::Result<ParamOptions> {
    let mut options = ParamOptions::default();
    let mut kept = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if !attr.path().is_ident("param") {
            kept.push(attr);
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                options.default = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("annotation") {
                options.annotation = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `default` or `annotation`"))
            }
        })?;
    }
    *attrs = kept;
    Ok(options)
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) => path.path.segments.last(),
        _ => None,
    }
}

/// `T` for `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        }),
        _ => None,
    }
}

fn is_call(ty: &Type) -> Option<bool> {
    let Type::Reference(reference) = ty else {
        return None;
    };
    let segment = last_segment(&reference.elem)?;
    (segment.ident == "Call").then_some(reference.mutability.is_some())
}

fn inferred_annotation(ty: &Type) -> Option<TokenStream2> {
    let segment = last_segment(ty)?;
    let ident = segment.ident.to_string();
    let annotation = match ident.as_str() {
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64" | "u128"
        | "usize" => quote!(::hugroute::types::number()),
        "f32" | "f64" => quote!(::hugroute::types::float_number()),
        "bool" => quote!(::hugroute::types::smart_boolean()),
        "String" => quote!(::hugroute::types::text()),
        "Vec" => {
            let PathArguments::AngleBracketed(args) = &segment.arguments else {
                return None;
            };
            let is_text = args.args.iter().any(|arg| {
                matches!(arg, GenericArgument::Type(inner)
                    if last_segment(inner).is_some_and(|s| s.ident == "String"))
            });
            if !is_text {
                return None;
            }
            quote!(::hugroute::types::multiple())
        }
        _ => return None,
    };
    Some(annotation)
}

fn doc_string(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit { lit: Lit::Str(lit), .. }) => Some(lit.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .collect();
    let doc = lines.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

fn expand(args: EndpointArgs, mut function: ItemFn) -> syn::Result<TokenStream2> {
    let fn_name = function.sig.ident.clone();
    let endpoint_fn = format_ident!("{}_endpoint", fn_name);
    let name = args
        .name
        .map_or_else(|| fn_name.to_string(), |lit| lit.value());
    let vis = function.vis.clone();

    let mut builder = vec![quote!(::hugroute::Signature::new(#name))];
    let mut extractions = Vec::new();
    let mut call_args = Vec::new();

    for input in &mut function.sig.inputs {
        let FnArg::Typed(typed) = input else {
            return Err(syn::Error::new_spanned(input, "endpoints cannot take `self`"));
        };
        let options = param_options(&mut typed.attrs)?;
        let Pat::Ident(pat) = &*typed.pat else {
            return Err(syn::Error::new_spanned(&typed.pat, "expected a plain parameter name"));
        };
        let ident = pat.ident.clone();
        let param = ident.to_string().trim_start_matches("r#").to_string();
        let ty = &*typed.ty;

        if let Some(mutable) = is_call(ty) {
            call_args.push(if mutable { quote!(&mut *call) } else { quote!(&*call) });
            continue;
        }

        let optional = option_inner(ty);
        let annotation = options
            .annotation
            .map(|expr| quote!(#expr))
            .or_else(|| inferred_annotation(optional.unwrap_or(ty)));
        let default = match (options.default, optional) {
            (Some(expr), _) => Some(quote!(::hugroute::__private::serde_json::Value::from(#expr))),
            (None, Some(_)) => Some(quote!(::hugroute::__private::serde_json::Value::Null)),
            (None, None) => None,
        };
        builder.push(match (default, annotation) {
            (None, None) => quote!(.param(#param)),
            (None, Some(annotation)) => quote!(.param_with(#param, #annotation)),
            (Some(default), None) => quote!(.optional(#param, #default)),
            (Some(default), Some(annotation)) => quote!(.optional_with(#param, #default, #annotation)),
        });
        extractions.push(quote!(let #ident: #ty = call.arg(#param)?;));
        call_args.push(quote!(#ident));
    }

    if let Some(doc) = doc_string(&function.attrs) {
        builder.push(quote!(.doc(#doc)));
    }
    let call = if call_args.is_empty() {
        format_ident!("_call")
    } else {
        format_ident!("call")
    };

    Ok(quote! {
        #function

        #[doc = concat!("The `", #name, "` endpoint.")]
        #[must_use]
        #vis fn #endpoint_fn() -> ::hugroute::Endpoint {
            ::hugroute::Endpoint::new(
                #(#builder)*,
                |#call: &mut ::hugroute::Call<'_>| -> ::std::result::Result<::hugroute::Content, ::hugroute::ApiError> {
                    #(#extractions)*
                    ::hugroute::IntoContent::into_content(#fn_name(#(#call_args),*))
                },
            )
        }
    })
}

#[proc_macro_attribute]
pub fn endpoint(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as EndpointArgs);
    let function = parse_macro_input!(item as ItemFn);
    expand(args, function)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
