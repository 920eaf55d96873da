//! Procedural macros for filterql
//!
//! - `#[derive(Entity)]` - describe an entity's attributes from a struct definition

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    parse_macro_input, spanned::Spanned, Data, DeriveInput, Fields, GenericArgument, Ident,
    LitStr, PathArguments, Type,
};

/// Derive `filterql::model::EntityModel` for a struct with named fields.
///
/// # Usage
///
/// ```ignore
/// #[derive(Entity)]
/// #[entity(name = "Book", table = "books")]
/// pub struct Book {
///     #[entity(primary)]
///     pub id: i64,
///     pub title: String,
///     pub published_year: Option<i32>,
///     #[entity(reference = "Author")]
///     pub author_id: i64,
///     #[entity(unique, field = "isbn13")]
///     pub isbn: String,
///     #[entity(value_type = "json")]
///     pub tags: Vec<String>,
///     #[entity(skip)]
///     pub cached_score: f64,
/// }
/// ```
///
/// Field names become internal attribute names; the camelCase form is the public
/// filter name unless `field = ".."` overrides it. `Option<T>` maps like `T`.
/// Primary and reference attributes are typed as IDs. The table defaults to the
/// snake_case struct name.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_entity(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldSpec {
    name: String,
    field_name: Option<String>,
    value_type: Option<String>,
    reference: Option<String>,
    primary: bool,
    unique: bool,
    skip: bool,
}

fn impl_entity(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_ident = &input.ident;

    let mut entity_name = struct_ident.to_string();
    let mut table = entity_name.to_case(Case::Snake);
    for attr in &input.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                entity_name = meta.value()?.parse::<LitStr>()?.value();
            } else if meta.path.is_ident("table") {
                table = meta.value()?.parse::<LitStr>()?.value();
            } else {
                return Err(meta.error("expected `name` or `table`"));
            }
            Ok(())
        })?;
    }

    let data = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "Entity can only be derived for structs",
            ))
        }
    };

    let fields = match &data.fields {
        Fields::Named(named) => &named.named,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "Entity requires named fields",
            ))
        }
    };

    let mut attributes = Vec::with_capacity(fields.len());

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new(field.span(), "Expected named field"))?;

        let mut spec = FieldSpec {
            name: ident.to_string().trim_start_matches("r#").to_string(),
            ..Default::default()
        };

        for attr in &field.attrs {
            if !attr.path().is_ident("entity") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary") {
                    spec.primary = true;
                } else if meta.path.is_ident("unique") {
                    spec.unique = true;
                } else if meta.path.is_ident("skip") {
                    spec.skip = true;
                } else if meta.path.is_ident("reference") {
                    spec.reference = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("field") {
                    spec.field_name = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("value_type") {
                    let lit: LitStr = meta.value()?.parse()?;
                    value_type_variant(&lit.value(), lit.span())?;
                    spec.value_type = Some(lit.value());
                } else {
                    return Err(meta.error(
                        "expected `primary`, `unique`, `skip`, `reference`, `field` or `value_type`",
                    ));
                }
                Ok(())
            })?;
        }

        if spec.skip {
            continue;
        }

        let variant = match (&spec.value_type, spec.primary || spec.reference.is_some()) {
            (Some(explicit), _) => value_type_variant(explicit, field.span())?,
            (None, true) => Ident::new("Id", Span::call_site()),
            (None, false) => Ident::new(infer_value_type(&field.ty), Span::call_site()),
        };

        let name = &spec.name;
        let field_name = spec
            .field_name
            .clone()
            .unwrap_or_else(|| name.to_case(Case::Camel));

        let mut attribute = quote! {
            ::filterql::model::AttributeDescriptor::new(
                #name,
                ::filterql::model::ValueType::#variant,
            )
            .field_name(#field_name)
        };
        if spec.primary {
            attribute = quote! { #attribute.primary() };
        }
        if spec.unique {
            attribute = quote! { #attribute.unique() };
        }
        if let Some(target) = &spec.reference {
            attribute = quote! { #attribute.reference(#target) };
        }
        attributes.push(attribute);
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::filterql::model::EntityModel for #struct_ident #ty_generics #where_clause {
            const ENTITY_NAME: &'static str = #entity_name;

            fn entity_builder() -> ::filterql::model::EntityBuilder {
                ::filterql::model::EntityBuilder::new(#entity_name)
                    .table(#table)
                    #(.attribute(#attributes))*
            }
        }
    })
}

fn value_type_variant(value: &str, span: Span) -> syn::Result<Ident> {
    let variant = match value.to_lowercase().as_str() {
        "id" => "Id",
        "string" | "text" => "String",
        "integer" | "int" => "Integer",
        "float" | "real" => "Float",
        "boolean" | "bool" => "Boolean",
        "timestamp" | "datetime" => "Timestamp",
        "json" => "Json",
        _ => {
            return Err(syn::Error::new(
                span,
                format!("unknown value type `{value}`"),
            ))
        }
    };
    Ok(Ident::new(variant, Span::call_site()))
}

/// Map a Rust field type to a `ValueType` variant name
fn infer_value_type(ty: &Type) -> &'static str {
    let Type::Path(path) = ty else {
        return match ty {
            Type::Reference(reference) => infer_value_type(&reference.elem),
            _ => "Json",
        };
    };
    let Some(segment) = path.path.segments.last() else {
        return "Json";
    };

    match segment.ident.to_string().as_str() {
        "Option" => match &segment.arguments {
            PathArguments::AngleBracketed(args) => match args.args.first() {
                Some(GenericArgument::Type(inner)) => infer_value_type(inner),
                _ => "Json",
            },
            _ => "Json",
        },
        "String" | "str" => "String",
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            "Integer"
        }
        "f32" | "f64" => "Float",
        "bool" => "Boolean",
        "Uuid" => "Id",
        "DateTime" | "NaiveDateTime" | "NaiveDate" | "OffsetDateTime" | "SystemTime" => {
            "Timestamp"
        }
        _ => "Json",
    }
}
