use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;

use super::*;
use crate::utils::{parse_flag, parse_key_value};

/// The arguments of the `#[memoize]` attribute.
#[derive(Default)]
pub struct Meta {
    key: Option<KeyList>,
    experimental: bool,
}

/// A bracketed list of parameter names, as in `key = [a, b]`.
struct KeyList {
    bracket: syn::token::Bracket,
    fields: Punctuated<syn::Ident, syn::Token![,]>,
}

mod kw {
    syn::custom_keyword!(key);
    syn::custom_keyword!(experimental);
}

impl Parse for Meta {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut meta = Meta::default();
        while !input.is_empty() {
            if let Some(key) = parse_key_value::<kw::key, KeyList>(input)? {
                meta.key = Some(key);
            } else if parse_flag::<kw::experimental>(input)? {
                meta.experimental = true;
            } else {
                return Err(input.error("veritas: expected `key = [..]` or `experimental`"));
            }
        }
        Ok(meta)
    }
}

impl Parse for KeyList {
    fn parse(input: ParseStream) -> Result<Self> {
        let content;
        let bracket = syn::bracketed!(content in input);
        let fields = Punctuated::parse_terminated(&content)?;
        Ok(Self { bracket, fields })
    }
}

/// Memoize a function.
pub fn expand(meta: Meta, mut func: syn::ItemFn) -> Result<proc_macro2::TokenStream> {
    if let Some(asyncness) = &func.sig.asyncness {
        bail!(asyncness, "async functions are not supported, wrap them in `AsyncMemoized`");
    }

    if !func.sig.generics.params.is_empty() {
        bail!(func.sig.generics, "generic functions are not supported");
    }

    let mut args = vec![];
    for input in &func.sig.inputs {
        let typed = match input {
            syn::FnArg::Typed(typed) => typed,
            syn::FnArg::Receiver(_) => {
                bail!(input, "methods are not supported")
            }
        };

        let name = match typed.pat.as_ref() {
            syn::Pat::Ident(syn::PatIdent { by_ref: None, ident, subpat: None, .. }) => {
                ident
            }
            pat => bail!(pat, "only simple identifiers are supported"),
        };

        args.push(name.clone());
    }

    // Resolve the key policy against the parameter list.
    let policy = match &meta.key {
        None => quote! { ::veritas::KeyPolicy::Default },
        Some(list) if list.fields.is_empty() => {
            return Err(Error::new(list.bracket.span.join(), "veritas: key list is empty"));
        }
        Some(list) => {
            for field in &list.fields {
                if !args.contains(field) {
                    bail!(field, "`{}` is not a parameter of this function", field);
                }
            }
            let fields = list.fields.iter().map(|field| field.to_string());
            quote! { ::veritas::KeyPolicy::fields([#(#fields),*]) }
        }
    };
    let experimental = meta.experimental;

    // Collect the documentation for introspection.
    let doc = docs(&func.attrs).map(|doc| quote! { .with_doc(#doc) });
    let name = func.sig.ident.to_string();
    let params = args.iter().map(|arg| arg.to_string());

    // The cached output and the function's new, fallible signature.
    let output = match &func.sig.output {
        syn::ReturnType::Default => quote! { () },
        syn::ReturnType::Type(_, ty) => quote! { #ty },
    };
    func.sig.output = parse_quote! { -> ::veritas::Result<#output> };

    // Adjust the function's body.
    let body = &func.block;
    func.block = parse_quote! { {
        static __CACHE: ::veritas::internal::StaticCache<#output> =
            ::veritas::internal::StaticCache::new(|| {
                ::veritas::internal::register_reset(|| __CACHE.clear());
                ::veritas::internal::StaticData::new(
                    ::veritas::FnMeta::new(#name)
                        #doc
                        #(.with_param(::veritas::Param::new(#params)))*,
                    ::veritas::CacheOptions::new()
                        .key(#policy)
                        .experimental(#experimental),
                )
            });

        let __args = ::veritas::Args::new()
            #(.arg(::core::clone::Clone::clone(&#args)))*;

        ::veritas::internal::memoized(&__CACHE, &__args, move || -> #output #body)
    } };

    Ok(quote! { #func })
}

/// Join the function's doc comments.
fn docs(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(syn::MetaNameValue {
                value: syn::Expr::Lit(syn::ExprLit { lit: syn::Lit::Str(lit), .. }),
                ..
            }) => Some(lit.value()),
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').map(str::to_owned).unwrap_or(line))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
