use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use synstructure::{BindingInfo, Structure};

pub fn derive_from(s: Structure) -> TokenStream {
    let name = &s.ast().ident;
    let (impl_generics, ty_generics, where_clause) = s.ast().generics.split_for_impl();
    let mut impls = TokenStream::new();

    for variant in s.variants() {
        let from = match variant.bindings()
            .iter()
            .find(is_from)
        {
            Some(from) => from,
            None => continue,
        };

        if variant.bindings().len() > 1 {
            impls.extend(quote_spanned!{variant.ast().ident.span()=>
                compile_error!(
                    "From can only be derived from variants with a single \
                    field");
            });
            continue;
        }

        let ty = &from.ast().ty;

        let constructor = variant.construct(|_, _| quote!(from));

        impls.extend(quote! {
            impl #impl_generics From<#ty> for #name #ty_generics #where_clause {
                fn from(from: #ty) -> Self {
                    #constructor
                }
            }
        });
    }

    impls
}

fn is_from(bi: &&BindingInfo) -> bool {
    bi.ast()
        .attrs
        .iter()
        .any(|attr| attr.path.is_ident("from"))
}
