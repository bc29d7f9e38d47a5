use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Lit, LitStr, Meta, NestedMeta, spanned::Spanned};
use synstructure::{BindingInfo, Structure, VariantInfo};

pub fn derive_error(s: Structure) -> TokenStream {
    let mut kinds = TokenStream::new();
    let mut codes = TokenStream::new();

    for variant in s.variants() {
        let pat = variant.pat();

        let (kind, code) = match Describe::of(variant) {
            Ok(describe) => (describe.kind(), describe.code()),
            Err(err) => {
                let err = err.to_compile_error();
                (err.clone(), err)
            }
        };

        kinds.extend(quote!(#pat => #kind,));
        codes.extend(quote!(#pat => #code,));
    }

    let name = &s.ast().ident;
    let (impl_generics, ty_generics, where_clause) = s.ast().generics.split_for_impl();

    quote! {
        impl #impl_generics crate::error::ApiError for #name #ty_generics #where_clause {
            fn kind(&self) -> crate::error::ErrorKind {
                match *self { #kinds }
            }

            fn code(&self) -> Option<std::borrow::Cow<str>> {
                match *self { #codes }
            }
        }
    }
}

/// How a single variant describes itself to API consumers.
enum Describe<'a> {
    /// `#[api(...)]` on the variant.
    Attr {
        kind: Option<LitStr>,
        code: Option<LitStr>,
    },
    /// No attribute; ask the `#[cause]` field.
    Cause(&'a BindingInfo<'a>),
}

impl<'a> Describe<'a> {
    fn of(variant: &'a VariantInfo<'a>) -> syn::Result<Describe<'a>> {
        let mut lists = Vec::new();

        for attr in variant.ast().attrs {
            if !attr.path.is_ident("api") {
                continue;
            }

            match attr.parse_meta()? {
                Meta::List(list) => lists.push(list),
                meta => return Err(syn::Error::new(
                    meta.span(), "expected #[api(...)]")),
            }
        }

        let list = match lists.len() {
            0 => return variant.bindings().iter()
                .find(|binding| is_cause(binding))
                .map(Describe::Cause)
                .ok_or_else(|| syn::Error::new(
                    variant.ast().ident.span(),
                    "variant needs either #[api(...)] or a #[cause] field",
                )),
            1 => lists.remove(0),
            _ => return Err(syn::Error::new(
                lists[1].span(), "duplicate #[api] attribute")),
        };

        if list.nested.is_empty() {
            return Err(syn::Error::new(list.span(), "#[api] needs arguments"));
        }

        let mut internal: Option<Span> = None;
        let mut kind = None;
        let mut code = None;

        for item in &list.nested {
            match item {
                NestedMeta::Meta(Meta::Path(path)) if path.is_ident("internal") =>
                    internal = Some(path.span()),
                NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("kind") =>
                    kind = Some(string(&nv.lit)?),
                NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("code") =>
                    code = Some(string(&nv.lit)?),
                _ => return Err(syn::Error::new(
                    item.span(), "unknown argument, expected internal, kind or code")),
            }
        }

        if let Some(span) = internal {
            if kind.is_some() || code.is_some() {
                return Err(syn::Error::new(
                    span, "internal errors take neither kind nor code"));
            }
        }

        Ok(Describe::Attr { kind, code })
    }

    fn kind(&self) -> TokenStream {
        match self {
            Describe::Attr { kind: Some(kind), .. } => {
                let kind = syn::Ident::new(&kind.value(), kind.span());
                quote!(crate::error::ErrorKind::#kind)
            }
            Describe::Attr { kind: None, .. } => quote!(crate::error::ErrorKind::Internal),
            Describe::Cause(cause) => quote!(crate::error::ApiError::kind(#cause)),
        }
    }

    fn code(&self) -> TokenStream {
        match self {
            Describe::Attr { code: Some(code), .. } =>
                quote!(Some(std::borrow::Cow::Borrowed(#code))),
            Describe::Attr { code: None, .. } => quote!(None),
            Describe::Cause(cause) => quote!(crate::error::ApiError::code(#cause)),
        }
    }
}

fn string(lit: &Lit) -> syn::Result<LitStr> {
    match lit {
        Lit::Str(s) => Ok(s.clone()),
        _ => Err(syn::Error::new(lit.span(), "expected a string")),
    }
}

fn is_cause(binding: &BindingInfo) -> bool {
    binding.ast().attrs.iter().any(|attr| attr.path.is_ident("cause"))
}
