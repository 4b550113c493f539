use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Field, Fields, GenericArgument, Ident,
    LitStr, Meta, PathArguments, Type,
};

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = generate_injectable_impl(&input).unwrap_or_else(syn::Error::into_compile_error);
    TokenStream::from(expanded)
}

enum Role {
    Param {
        declared: Option<TokenStream2>,
        default: Option<Expr>,
        optional: bool,
        /// `dyn Trait` inside `Arc`, filled by an interface binding.
        trait_object: Option<Type>,
    },
    Property {
        default: Option<Expr>,
    },
    Skip {
        default: Option<Expr>,
    },
}

struct FieldPlan<'a> {
    ident: &'a Ident,
    role: Role,
}

fn generate_injectable_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "#[derive(Injectable)] only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Injectable)] can only be applied to structs",
            ));
        }
    };

    let type_name = type_name(&input.attrs)?
        .unwrap_or_else(|| LitStr::new(&struct_name.to_string(), struct_name.span()));

    let plans = fields
        .iter()
        .map(plan_field)
        .collect::<syn::Result<Vec<_>>>()?;

    let mut parameters = Vec::new();
    let mut initializers = Vec::new();
    let mut settable = Vec::new();
    let mut read_only = Vec::new();

    for plan in &plans {
        let ident = plan.ident;
        let name = ident.to_string();
        match &plan.role {
            Role::Param {
                declared,
                default,
                optional,
                trait_object,
            } => {
                let index = parameters.len();
                let mut parameter = match declared {
                    Some(id) => quote!(::meshweave::Parameter::of_type(#name, #id)),
                    None => quote!(::meshweave::Parameter::new(#name)),
                };
                if let Some(default) = default {
                    parameter = quote!(#parameter.with_default(#default));
                }
                if *optional {
                    parameter = quote!(#parameter.optional());
                }
                parameters.push(parameter);
                initializers.push(match (trait_object, *optional) {
                    (Some(inner), true) => quote!(#ident: args.take_optional_trait::<#inner>(#index)?),
                    (Some(inner), false) => quote!(#ident: args.take_trait::<#inner>(#index)?),
                    (None, _) => quote!(#ident: args.take(#index)?),
                });
                read_only.push(name);
            }
            Role::Property { default } => {
                initializers.push(initial_value(ident, default.as_ref()));
                settable.push(quote! {
                    #name => {
                        self.#ident = ::meshweave::FromValue::from_value(value)?;
                        ::core::result::Result::Ok(())
                    }
                });
            }
            Role::Skip { default } => {
                initializers.push(initial_value(ident, default.as_ref()));
            }
        }
    }

    let read_only_arm = if read_only.is_empty() {
        quote!()
    } else {
        quote! {
            #(#read_only)|* => ::core::result::Result::Err(
                ::meshweave::PropertyError::ReadOnly(name.to_string())
            ),
        }
    };

    Ok(quote! {
        impl #impl_generics ::meshweave::Injectable for #struct_name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            fn parameters() -> ::std::vec::Vec<::meshweave::Parameter> {
                ::std::vec![#(#parameters),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn construct(mut args: ::meshweave::Args) -> ::meshweave::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#initializers),*
                })
            }
        }

        impl #impl_generics ::meshweave::Component for #struct_name #ty_generics #where_clause {
            fn set_property(
                &mut self,
                name: &str,
                value: ::meshweave::Value,
            ) -> ::core::result::Result<(), ::meshweave::PropertyError> {
                match name {
                    #(#settable)*
                    #read_only_arm
                    _ => {
                        let _ = value;
                        ::core::result::Result::Err(
                            ::meshweave::PropertyError::Unknown(name.to_string())
                        )
                    }
                }
            }
        }
    })
}

fn initial_value(ident: &Ident, default: Option<&Expr>) -> TokenStream2 {
    match default {
        Some(expr) => quote!(#ident: ::core::convert::Into::into(#expr)),
        None => quote!(#ident: ::core::default::Default::default()),
    }
}

fn type_name(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("injectable")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(name)
}

fn plan_field(field: &Field) -> syn::Result<FieldPlan<'_>> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;

    let mut id: Option<LitStr> = None;
    let mut default: Option<Expr> = None;
    let mut skip = false;
    let mut property = false;

    for attr in &field.attrs {
        if attr.path().is_ident("property") {
            property = true;
            if matches!(attr.meta, Meta::Path(_)) {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    default = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `default = ...`"))
                }
            })?;
        } else if attr.path().is_ident("inject") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    id = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("default") {
                    default = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("skip") {
                    skip = true;
                } else {
                    return Err(meta.error("expected `id`, `default` or `skip`"));
                }
                Ok(())
            })?;
        }
    }

    if property && (skip || id.is_some()) {
        return Err(syn::Error::new_spanned(
            ident,
            "#[property] fields cannot be skipped or autowired",
        ));
    }

    let role = if property {
        Role::Property { default }
    } else if skip {
        Role::Skip { default }
    } else {
        let optional_inner = option_inner(&field.ty);
        let injected = arc_inner(optional_inner.unwrap_or(&field.ty));
        let trait_object = injected.filter(|inner| matches!(inner, Type::TraitObject(_)));
        let declared = match (id, injected) {
            (Some(id), _) => Some(quote!(#id)),
            (None, Some(_)) if trait_object.is_some() => {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "trait object fields need #[inject(id = \"...\")] naming their binding",
                ));
            }
            (None, Some(inner)) => Some(quote!(<#inner as ::meshweave::Injectable>::TYPE_NAME)),
            (None, None) => None,
        };
        Role::Param {
            declared,
            default,
            optional: optional_inner.is_some(),
            trait_object: trait_object.cloned(),
        }
    };

    Ok(FieldPlan { ident, role })
}

/// Inner type of `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    single_generic(ty, "Option")
}

/// Inner type of `Arc<T>`.
fn arc_inner(ty: &Type) -> Option<&Type> {
    single_generic(ty, "Arc")
}

fn single_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) => Some(inner),
        _ => None,
    }
}
