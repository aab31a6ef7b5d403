//! Plain-text bodies for order emails.

use super::MailMessage;
use flashmart_core::{Order, OrderStatus};

/// "Order Confirmation - ORD-2026-00001"
pub fn order_confirmation(order: &Order, from: &str) -> MailMessage {
    let items: String = order
        .items
        .iter()
        .map(|item| {
            format!(
                "  {} x{} @ {} = {}\n",
                item.name,
                item.quantity,
                item.unit_price,
                item.line_total()
            )
        })
        .collect();

    let body = format!(
        "Dear {name},\n\
         \n\
         Thank you for your order! Your order has been successfully placed.\n\
         \n\
         Order ID:   {number}\n\
         Order Date: {date}\n\
         Status:     {status}\n\
         \n\
         Items\n\
         {items}\
         Total Amount: {total}\n\
         \n\
         {address}\
         \n\
         You can track your order status by logging into your account.\n",
        name = order.customer_name,
        number = order.order_number,
        date = order.created_at.format("%d %b %Y %H:%M UTC"),
        status = order.status,
        items = items,
        total = order.total_amount,
        address = address_block(order),
    );

    MailMessage {
        from: from.to_string(),
        to: order.customer_email.clone(),
        subject: format!("Order Confirmation - {}", order.order_number),
        body,
    }
}

/// "Order Status Update - ORD-2026-00001"
pub fn status_update(order: &Order, status: OrderStatus, from: &str) -> MailMessage {
    let shipping_note = if status == OrderStatus::Shipped {
        "Your package is on its way! Expected delivery within 3-5 business days.\n"
    } else {
        ""
    };

    let body = format!(
        "Dear {name},\n\
         \n\
         Your order status has been updated.\n\
         \n\
         Order ID:     {number}\n\
         New Status:   {status}\n\
         Total Amount: {total}\n\
         \n\
         {message}\n\
         {shipping_note}\
         \n\
         You can view your complete order details by logging into your account.\n",
        name = order.customer_name,
        number = order.order_number,
        status = status,
        total = order.total_amount,
        message = status.customer_message(),
        shipping_note = shipping_note,
    );

    MailMessage {
        from: from.to_string(),
        to: order.customer_email.clone(),
        subject: format!("Order Status Update - {}", order.order_number),
        body,
    }
}

fn address_block(order: &Order) -> String {
    let address = &order.shipping_address;
    format!(
        "Shipping Address\n  {}\n  {}\n  {}\n  {}, {} - {}\n",
        address.name, address.phone, address.street, address.city, address.state, address.pincode
    )
}
